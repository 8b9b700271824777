use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use http::{HeaderMap, StatusCode};
use tracing::{debug, instrument};

use crate::domain::{CalculateCostRequest, PricingTierRequest};
use crate::http::{CalculateCostBody, CostResponse, ParcelApiServices, PricingTierBody, PricingTierResponse};
use common::auth::{Role, extract_user_context};
use common::http::{ApiResult, json_body};

fn tier_request(body: PricingTierBody) -> PricingTierRequest {
    PricingTierRequest {
        name: body.name,
        base_price: body.base_price,
        price_per_kg: body.price_per_kg,
        estimated_delivery_days: body.estimated_delivery_days,
        is_active: body.is_active,
        description: body.description,
    }
}

#[instrument(name = "ListPricingTiers", skip(services))]
pub async fn list_tiers(
    State(services): State<ParcelApiServices>,
) -> ApiResult<Json<Vec<PricingTierResponse>>> {
    let tiers = services.pricing_service.list_active_tiers().await?;
    Ok(Json(tiers.into_iter().map(Into::into).collect()))
}

#[instrument(name = "CalculateCost", skip(services, body))]
pub async fn calculate_cost(
    State(services): State<ParcelApiServices>,
    body: Result<Json<CalculateCostBody>, JsonRejection>,
) -> ApiResult<Json<CostResponse>> {
    let body = json_body(body)?;
    let pricing_tier_id = body.pricing_tier_id;
    let weight_kg = body.weight_kg;

    let shipping_cost = services
        .pricing_service
        .calculate_cost(CalculateCostRequest {
            weight_kg,
            pricing_tier_id,
            pickup_location: body.pickup_location,
            delivery_location: body.delivery_location,
        })
        .await?;

    Ok(Json(CostResponse {
        pricing_tier_id,
        weight_kg,
        shipping_cost,
    }))
}

#[instrument(name = "CreatePricingTier", skip(services, headers, body))]
pub async fn create_tier(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    body: Result<Json<PricingTierBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PricingTierResponse>)> {
    let user_context = extract_user_context(&headers, services.auth_token_provider.as_ref())?;
    user_context.require_role(&[Role::Admin])?;
    let body = json_body(body)?;

    let tier = services.pricing_service.create_tier(tier_request(body)).await?;

    debug!(tier_id = tier.id, "Pricing tier created");
    Ok((StatusCode::CREATED, Json(tier.into())))
}

#[instrument(name = "GetPricingTier", skip(services))]
pub async fn get_tier(
    State(services): State<ParcelApiServices>,
    Path(id): Path<i32>,
) -> ApiResult<Json<PricingTierResponse>> {
    let tier = services.pricing_service.get_tier(id).await?;
    Ok(Json(tier.into()))
}

#[instrument(name = "UpdatePricingTier", skip(services, headers, body))]
pub async fn update_tier(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    Path(id): Path<i32>,
    body: Result<Json<PricingTierBody>, JsonRejection>,
) -> ApiResult<Json<PricingTierResponse>> {
    let user_context = extract_user_context(&headers, services.auth_token_provider.as_ref())?;
    user_context.require_role(&[Role::Admin])?;
    let body = json_body(body)?;

    let tier = services
        .pricing_service
        .update_tier(id, tier_request(body))
        .await?;
    Ok(Json(tier.into()))
}

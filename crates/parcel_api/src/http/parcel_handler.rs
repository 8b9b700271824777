use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use http::{HeaderMap, StatusCode};
use std::str::FromStr;
use tracing::{debug, instrument};

use crate::domain::{
    CreateParcelRequest, HandlerActionRequest, HistoryRequest, IssueOtpRequest,
    UpdateStatusRequest, VerifyOtpRequest,
};
use crate::http::{
    CreateParcelBody, DeliveryInitiatedResponse, HandlerActionBody, HistoryEntryResponse,
    ParcelApiServices, ParcelResponse, TrackingResponse, UpdateStatusBody, VerifyDeliveryBody,
};
use common::auth::{Role, UserContext, extract_user_context};
use common::domain::{ListParcelsFilter, ParcelStatus};
use common::http::{ApiResult, json_body, optional_json_body};

fn authorize(
    services: &ParcelApiServices,
    headers: &HeaderMap,
    allowed: &[Role],
) -> ApiResult<UserContext> {
    let user_context = extract_user_context(headers, services.auth_token_provider.as_ref())?;
    user_context.require_role(allowed)?;
    Ok(user_context)
}

/// Scan, hand-over and initiate-delivery accept an empty body, but not a malformed one
fn action_request(
    tracking_code: String,
    body: &[u8],
    user_context: UserContext,
) -> ApiResult<HandlerActionRequest> {
    let body: HandlerActionBody = optional_json_body(body)?.unwrap_or_default();
    Ok(HandlerActionRequest {
        tracking_code,
        location: body.location,
        notes: body.notes,
        handled_by: Some(user_context.user_id),
    })
}

#[instrument(name = "CreateParcel", skip(services, headers, body))]
pub async fn create_parcel(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    body: Result<Json<CreateParcelBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ParcelResponse>)> {
    let user_context = authorize(&services, &headers, &[Role::Sender])?;
    let body = json_body(body)?;

    let parcel = services
        .lifecycle_service
        .create_parcel(CreateParcelRequest {
            sender_id: user_context.user_id,
            sender_email: user_context.email,
            recipient_email: body.recipient_email,
            description: body.description,
            weight_kg: body.weight_kg,
            pickup_location: body.pickup_location,
            delivery_location: body.delivery_location,
            expected_pickup_at: body.expected_pickup_at,
            expected_delivery_at: body.expected_delivery_at,
            pricing_tier_id: body.pricing_tier_id,
        })
        .await?;

    debug!(tracking_code = %parcel.tracking_code, "Parcel created successfully");
    Ok((StatusCode::CREATED, Json(parcel.into())))
}

#[instrument(name = "TrackParcel", skip(services, headers))]
pub async fn track_parcel(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    Path(tracking_code): Path<String>,
) -> ApiResult<Json<TrackingResponse>> {
    authorize(&services, &headers, &[Role::Sender, Role::Handler, Role::Admin])?;

    let tracking = services.lifecycle_service.track(&tracking_code).await?;
    Ok(Json(tracking.into()))
}

#[instrument(name = "MyParcels", skip(services, headers))]
pub async fn my_parcels(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<ParcelResponse>>> {
    let user_context = authorize(&services, &headers, &[Role::Sender])?;

    let parcels = services
        .lifecycle_service
        .list_parcels(ListParcelsFilter::BySender(user_context.user_id))
        .await?;
    Ok(Json(parcels.into_iter().map(Into::into).collect()))
}

#[instrument(name = "AllParcels", skip(services, headers))]
pub async fn all_parcels(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<ParcelResponse>>> {
    authorize(&services, &headers, &[Role::Admin, Role::Handler])?;

    let parcels = services
        .lifecycle_service
        .list_parcels(ListParcelsFilter::All)
        .await?;
    Ok(Json(parcels.into_iter().map(Into::into).collect()))
}

#[instrument(name = "ParcelsByStatus", skip(services, headers))]
pub async fn parcels_by_status(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    Path(status): Path<String>,
) -> ApiResult<Json<Vec<ParcelResponse>>> {
    authorize(&services, &headers, &[Role::Admin])?;
    let status = ParcelStatus::from_str(&status)?;

    let parcels = services
        .lifecycle_service
        .list_parcels(ListParcelsFilter::ByStatus(status))
        .await?;
    Ok(Json(parcels.into_iter().map(Into::into).collect()))
}

#[instrument(name = "GetParcel", skip(services, headers))]
pub async fn get_parcel(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    Path(tracking_code): Path<String>,
) -> ApiResult<Json<ParcelResponse>> {
    authorize(&services, &headers, &[Role::Admin, Role::Handler])?;

    let parcel = services.lifecycle_service.get_parcel(&tracking_code).await?;
    Ok(Json(parcel.into()))
}

#[instrument(name = "ParcelHistory", skip(services, headers))]
pub async fn parcel_history(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    Path(tracking_code): Path<String>,
) -> ApiResult<Json<Vec<HistoryEntryResponse>>> {
    let user_context = authorize(
        &services,
        &headers,
        &[Role::Admin, Role::Handler, Role::Sender],
    )?;

    // Senders only see their own parcels
    let owner_id = (user_context.role == Role::Sender).then_some(user_context.user_id);

    let entries = services
        .lifecycle_service
        .history(HistoryRequest {
            tracking_code,
            owner_id,
        })
        .await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

#[instrument(name = "ScanParcel", skip(services, headers, body))]
pub async fn scan_parcel(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    Path(tracking_code): Path<String>,
    body: Bytes,
) -> ApiResult<Json<ParcelResponse>> {
    let user_context = authorize(&services, &headers, &[Role::Handler])?;

    let parcel = services
        .lifecycle_service
        .scan(action_request(tracking_code, &body, user_context)?)
        .await?;
    Ok(Json(parcel.into()))
}

#[instrument(name = "HandOverParcel", skip(services, headers, body))]
pub async fn hand_over_parcel(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    Path(tracking_code): Path<String>,
    body: Bytes,
) -> ApiResult<Json<ParcelResponse>> {
    let user_context = authorize(&services, &headers, &[Role::Handler])?;

    let parcel = services
        .lifecycle_service
        .hand_over(action_request(tracking_code, &body, user_context)?)
        .await?;
    Ok(Json(parcel.into()))
}

#[instrument(name = "UpdateParcelStatus", skip(services, headers, body))]
pub async fn update_parcel_status(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    Path(tracking_code): Path<String>,
    body: Result<Json<UpdateStatusBody>, JsonRejection>,
) -> ApiResult<Json<ParcelResponse>> {
    let user_context = authorize(&services, &headers, &[Role::Handler])?;
    let body = json_body(body)?;

    let parcel = services
        .lifecycle_service
        .update_status(UpdateStatusRequest {
            tracking_code,
            status: body.status,
            actual_pickup_at: body.actual_pickup_at,
            actual_delivery_at: body.actual_delivery_at,
            location: body.location,
            notes: body.notes,
            handled_by: Some(user_context.user_id),
        })
        .await?;
    Ok(Json(parcel.into()))
}

#[instrument(name = "InitiateDelivery", skip(services, headers, body))]
pub async fn initiate_delivery(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    Path(tracking_code): Path<String>,
    body: Bytes,
) -> ApiResult<Json<DeliveryInitiatedResponse>> {
    let user_context = authorize(&services, &headers, &[Role::Handler])?;

    let outcome = services
        .lifecycle_service
        .initiate_delivery(action_request(tracking_code, &body, user_context)?)
        .await?;
    Ok(Json(outcome.into()))
}

#[instrument(name = "ReissueDeliveryCode", skip(services, headers))]
pub async fn reissue_delivery_code(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    Path(tracking_code): Path<String>,
) -> ApiResult<Json<DeliveryInitiatedResponse>> {
    let user_context = authorize(&services, &headers, &[Role::Handler])?;

    let outcome = services
        .lifecycle_service
        .reissue_delivery_code(IssueOtpRequest {
            tracking_code,
            handled_by: Some(user_context.user_id),
        })
        .await?;
    Ok(Json(outcome.into()))
}

#[instrument(name = "VerifyDelivery", skip(services, headers, body))]
pub async fn verify_delivery(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    body: Result<Json<VerifyDeliveryBody>, JsonRejection>,
) -> ApiResult<Json<ParcelResponse>> {
    let user_context = authorize(&services, &headers, &[Role::Handler])?;
    let body = json_body(body)?;

    let parcel = services
        .lifecycle_service
        .verify_delivery(VerifyOtpRequest {
            tracking_code: body.tracking_code,
            code: body.code,
            location: body.location,
            handled_by: Some(user_context.user_id),
        })
        .await?;

    debug!(tracking_code = %parcel.tracking_code, "Delivery verified");
    Ok(Json(parcel.into()))
}

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use http::HeaderMap;
use tracing::{debug, instrument};

use crate::domain::{ReportTamperingRequest, ResolveTamperingRequest};
use crate::http::{
    ParcelApiServices, ReportTamperBody, ResolveTamperBody, TamperAlertResponse,
    TamperOutcomeResponse,
};
use common::auth::{Role, extract_user_context};
use common::http::{ApiResult, json_body};

const TAMPER_ROLES: &[Role] = &[Role::Handler, Role::Admin];

#[instrument(name = "ReportTampering", skip(services, headers, body))]
pub async fn report_tampering(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    body: Result<Json<ReportTamperBody>, JsonRejection>,
) -> ApiResult<Json<TamperOutcomeResponse>> {
    let user_context = extract_user_context(&headers, services.auth_token_provider.as_ref())?;
    user_context.require_role(TAMPER_ROLES)?;
    let body = json_body(body)?;

    let outcome = services
        .lifecycle_service
        .report_tampering(ReportTamperingRequest {
            tracking_code: body.tracking_code,
            reason: body.reason,
            location: body.location,
            reported_by: Some(user_context.user_id),
        })
        .await?;

    debug!(alert_id = %outcome.alert_id, "Tampering reported");
    Ok(Json(outcome.into()))
}

#[instrument(name = "ResolveTampering", skip(services, headers, body))]
pub async fn resolve_tampering(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    body: Result<Json<ResolveTamperBody>, JsonRejection>,
) -> ApiResult<Json<TamperOutcomeResponse>> {
    let user_context = extract_user_context(&headers, services.auth_token_provider.as_ref())?;
    user_context.require_role(TAMPER_ROLES)?;
    let body = json_body(body)?;

    let outcome = services
        .lifecycle_service
        .resolve_tampering(ResolveTamperingRequest {
            tracking_code: body.tracking_code,
            resolution: body.resolution,
            next_status: body.next_status,
            location: body.location,
            resolved_by: Some(user_context.user_id),
        })
        .await?;

    debug!(alert_id = %outcome.alert_id, status = %outcome.parcel.status, "Tampering resolved");
    Ok(Json(outcome.into()))
}

#[instrument(name = "TamperHistory", skip(services, headers))]
pub async fn tamper_history(
    State(services): State<ParcelApiServices>,
    headers: HeaderMap,
    Path(tracking_code): Path<String>,
) -> ApiResult<Json<Vec<TamperAlertResponse>>> {
    let user_context = extract_user_context(&headers, services.auth_token_provider.as_ref())?;
    user_context.require_role(TAMPER_ROLES)?;

    let alerts = services.tamper_workflow.list_alerts(&tracking_code).await?;
    Ok(Json(alerts.into_iter().map(Into::into).collect()))
}

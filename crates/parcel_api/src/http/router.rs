use axum::Router;
use axum::routing::{get, post, put};
use common::auth::AuthTokenProvider;
use common::http::{HttpServerConfig, run_http_server};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::domain::{ParcelLifecycleService, PricingService, TamperWorkflow};
use crate::http::{parcel_handler, pricing_handler, tamper_handler};

/// Services shared by every handler
#[derive(Clone)]
pub struct ParcelApiServices {
    pub lifecycle_service: Arc<ParcelLifecycleService>,
    pub tamper_workflow: Arc<TamperWorkflow>,
    pub pricing_service: Arc<PricingService>,
    pub auth_token_provider: Arc<dyn AuthTokenProvider>,
}

async fn health() -> &'static str {
    "OK"
}

/// Build all parcel, tamper and pricing routes
pub fn build_parcel_api_router(services: ParcelApiServices) -> Router {
    Router::new()
        .route("/health", get(health))
        // Parcels
        .route("/api/parcels/create", post(parcel_handler::create_parcel))
        .route("/api/parcels/track/:id", get(parcel_handler::track_parcel))
        .route("/api/parcels/my-parcels", get(parcel_handler::my_parcels))
        .route("/api/parcels/all-parcels", get(parcel_handler::all_parcels))
        .route(
            "/api/parcels/status/:status",
            get(parcel_handler::parcels_by_status),
        )
        .route("/api/parcels/:id", get(parcel_handler::get_parcel))
        .route("/api/parcels/:id/history", get(parcel_handler::parcel_history))
        .route("/api/parcels/:id/status", put(parcel_handler::update_parcel_status))
        .route("/api/parcels/scan/:id", post(parcel_handler::scan_parcel))
        .route("/api/parcels/handover/:id", post(parcel_handler::hand_over_parcel))
        .route(
            "/api/parcels/initiate-delivery/:id",
            post(parcel_handler::initiate_delivery),
        )
        .route(
            "/api/parcels/reissue-code/:id",
            post(parcel_handler::reissue_delivery_code),
        )
        .route(
            "/api/parcels/verify-delivery",
            post(parcel_handler::verify_delivery),
        )
        // Tampering
        .route("/api/tamper/report", post(tamper_handler::report_tampering))
        .route("/api/tamper/resolve", post(tamper_handler::resolve_tampering))
        .route("/api/tamper/history/:id", get(tamper_handler::tamper_history))
        // Pricing
        .route("/api/pricing/tiers", get(pricing_handler::list_tiers))
        .route("/api/pricing/calculate", post(pricing_handler::calculate_cost))
        .route("/api/pricing/tier", post(pricing_handler::create_tier))
        .route(
            "/api/pricing/tier/:id",
            get(pricing_handler::get_tier).put(pricing_handler::update_tier),
        )
        .with_state(services)
}

/// Serve the parcel API until cancelled
pub async fn run_parcel_http_server(
    config: HttpServerConfig,
    services: ParcelApiServices,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    info!(host = %config.host, port = config.port, "starting parcel HTTP API");
    run_http_server(config, build_parcel_api_router(services), cancellation_token).await
}

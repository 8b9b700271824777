mod config;

use common::auth::{AuthTokenProvider, JwtAuthTokenProvider, JwtConfig};
use common::domain::{
    LogNotificationDispatcher, NotificationDispatcher, RandomOtpCodeSource, SystemClock,
};
use common::http::{CorsConfig, HttpLoggingConfig, HttpServerConfig};
use common::postgres::{
    PostgresClient, PostgresConfig, PostgresParcelRepository, PostgresPricingTierRepository,
    run_migrations,
};
use common::telemetry::{TelemetryConfig, TelemetryProviders, init_telemetry, shutdown_telemetry};
use common::webhook::WebhookNotificationDispatcher;
use crate::config::ServiceConfig;
use parcel_api::domain::{
    OperationTimeouts, OtpVerifier, ParcelLedger, ParcelLifecycleService, PricingService,
    TamperWorkflow,
};
use parcel_api::http::ParcelApiServices;
use parcel_api::parcel_api::ParcelApi;
use parcel_runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize telemetry (tracing + OpenTelemetry for traces and logs)
    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        otel_endpoint = %config.otel_endpoint,
        "Starting parcel-all-in-one service"
    );
    debug!("Configuration: {:?}", config);

    let services = match build_services(&config).await {
        Ok(services) => services,
        Err(e) => {
            error!("Failed to initialize services: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let parcel_api = ParcelApi::new(services, http_server_config(&config));

    let result = Runner::new()
        .with_named_process("parcel_api", parcel_api.into_runner_process())
        .with_closer("telemetry", move || async move {
            // Flush pending traces and logs
            shutdown_telemetry(telemetry_providers);
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(config.shutdown_timeout_secs))
        .run()
        .await;

    if let Err(e) = result {
        eprintln!("parcel-all-in-one stopped with error: {:#}", e);
        std::process::exit(1);
    }
}

async fn build_services(config: &ServiceConfig) -> anyhow::Result<ParcelApiServices> {
    info!("Initializing PostgreSQL...");
    let postgres_client = PostgresClient::new(&PostgresConfig {
        host: config.postgres_host.clone(),
        port: config.postgres_port,
        database: config.postgres_database.clone(),
        username: config.postgres_username.clone(),
        password: config.postgres_password.clone(),
        max_pool_size: config.postgres_max_pool_size,
        connect_timeout_secs: config.postgres_connect_timeout_secs,
        statement_timeout_ms: config.postgres_statement_timeout_ms,
    })?;
    postgres_client.ping().await?;
    let applied = run_migrations(&postgres_client).await?;
    info!(applied, "PostgreSQL migrations complete");

    let parcel_repository = Arc::new(PostgresParcelRepository::new(postgres_client.clone()));
    let pricing_tier_repository = Arc::new(PostgresPricingTierRepository::new(postgres_client));

    let timeouts = OperationTimeouts {
        repository: Duration::from_millis(config.repository_timeout_ms),
        notification: Duration::from_millis(config.notification_timeout_ms),
    };

    let ledger = Arc::new(ParcelLedger::new(
        parcel_repository,
        notification_dispatcher(config, timeouts.notification)?,
        Arc::new(SystemClock),
        timeouts,
    ));
    let otp_verifier = Arc::new(OtpVerifier::new(
        ledger.clone(),
        Arc::new(RandomOtpCodeSource),
    ));
    let tamper_workflow = Arc::new(TamperWorkflow::new(ledger.clone()));
    let pricing_service = Arc::new(PricingService::new(
        pricing_tier_repository,
        timeouts.repository,
    ));
    let lifecycle_service = Arc::new(ParcelLifecycleService::new(
        ledger,
        otp_verifier,
        tamper_workflow.clone(),
        pricing_service.clone(),
    ));

    let auth_token_provider: Arc<dyn AuthTokenProvider> = Arc::new(JwtAuthTokenProvider::new(
        JwtConfig::new(config.jwt_secret.clone(), config.jwt_expiration_hours),
    ));

    Ok(ParcelApiServices {
        lifecycle_service,
        tamper_workflow,
        pricing_service,
        auth_token_provider,
    })
}

fn notification_dispatcher(
    config: &ServiceConfig,
    timeout: Duration,
) -> anyhow::Result<Arc<dyn NotificationDispatcher>> {
    if config.notification_webhook_url.is_empty() {
        info!("No notification webhook configured, delivery codes will be logged");
        return Ok(Arc::new(LogNotificationDispatcher));
    }

    info!(url = %config.notification_webhook_url, "Sending delivery codes via webhook");
    Ok(Arc::new(WebhookNotificationDispatcher::new(
        config.notification_webhook_url.clone(),
        timeout,
    )?))
}

fn http_server_config(config: &ServiceConfig) -> HttpServerConfig {
    let cors_config = if config.cors_allowed_origins.trim().is_empty() {
        None
    } else {
        Some(CorsConfig::from_comma_separated(&config.cors_allowed_origins))
    };

    HttpServerConfig {
        host: config.http_host.clone(),
        port: config.http_port,
        logging_config: HttpLoggingConfig::new(config.ignored_paths()),
        cors_config,
    }
}

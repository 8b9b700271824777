//! Reusable HTTP server with request logging and CORS.
//!
//! # Example
//!
//! ```ignore
//! use common::http::{HttpServerConfig, CorsConfig, run_http_server};
//!
//! let config = HttpServerConfig {
//!     port: 8080,
//!     cors_config: Some(CorsConfig::allow_all()),
//!     ..Default::default()
//! };
//!
//! run_http_server(config, router, cancellation_token).await?;
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use http::{HeaderName, Method};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info};

use super::{HttpLoggingConfig, HttpLoggingLayer};

/// CORS configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins. Use `vec!["*".to_string()]` to allow all origins.
    pub allowed_origins: Vec<String>,
    /// Max age for CORS preflight cache in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            max_age_secs: 3600,
        }
    }
}

impl CorsConfig {
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse comma-separated origins string.
    pub fn from_comma_separated(origins: &str) -> Self {
        let allowed_origins: Vec<String> = origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            allowed_origins: if allowed_origins.is_empty() {
                vec!["*".to_string()]
            } else {
                allowed_origins
            },
            max_age_secs: 3600,
        }
    }
}

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    pub logging_config: HttpLoggingConfig,
    /// CORS is disabled when `None`
    pub cors_config: Option<CorsConfig>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            logging_config: HttpLoggingConfig::default(),
            cors_config: None,
        }
    }
}

fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let allow_origin = if config.allowed_origins.len() == 1 && config.allowed_origins[0] == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
        ])
        .max_age(Duration::from_secs(config.max_age_secs))
}

/// Apply the shared middleware stack to a router
pub fn with_middleware(router: Router, config: &HttpServerConfig) -> Router {
    let router = router.layer(HttpLoggingLayer::new(config.logging_config.clone()));
    match &config.cors_config {
        Some(cors) => router.layer(build_cors_layer(cors)),
        None => router,
    }
}

/// Serve `router` until the cancellation token fires
pub async fn run_http_server(
    config: HttpServerConfig,
    router: Router,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let app = with_middleware(router, &config);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "HTTP server listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancellation_token.cancelled().await;
            info!("HTTP server shutdown signal received");
        })
        .await;

    match result {
        Ok(()) => {
            info!("HTTP server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "HTTP server error");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_from_comma_separated() {
        let cors = CorsConfig::from_comma_separated("http://localhost:5173, http://127.0.0.1:5173");
        assert_eq!(cors.allowed_origins.len(), 2);
        assert_eq!(cors.allowed_origins[1], "http://127.0.0.1:5173");
    }

    #[test]
    fn test_cors_empty_falls_back_to_any() {
        let cors = CorsConfig::from_comma_separated(" , ");
        assert_eq!(cors.allowed_origins, vec!["*".to_string()]);
    }
}

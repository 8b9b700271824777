use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // HTTP configuration
    #[serde(default = "default_http_host")]
    pub http_host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Comma-separated path prefixes excluded from request logging
    #[serde(default = "default_http_ignored_paths")]
    pub http_ignored_paths: String,

    /// Comma-separated list of allowed origins, "*" for any. Empty disables CORS.
    #[serde(default)]
    pub cors_allowed_origins: String,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    #[serde(default = "default_postgres_connect_timeout_secs")]
    pub postgres_connect_timeout_secs: u64,

    /// Server-side statement timeout in milliseconds, zero disables it
    #[serde(default = "default_postgres_statement_timeout_ms")]
    pub postgres_statement_timeout_ms: u64,

    // Auth configuration
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_jwt_expiration_hours")]
    pub jwt_expiration_hours: u64,

    // Deadlines
    /// Bound on every repository call
    #[serde(default = "default_repository_timeout_ms")]
    pub repository_timeout_ms: u64,

    /// Bound on every notification dispatch
    #[serde(default = "default_notification_timeout_ms")]
    pub notification_timeout_ms: u64,

    /// Webhook receiving delivery-code notifications. Empty logs them instead.
    #[serde(default)]
    pub notification_webhook_url: String,

    // OpenTelemetry configuration
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,

    /// Upper bound for cleanup on shutdown, in seconds
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_ignored_paths() -> String {
    "/health".to_string()
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "parcel".to_string()
}

fn default_postgres_username() -> String {
    "parcel".to_string()
}

fn default_postgres_password() -> String {
    "parcel".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_postgres_connect_timeout_secs() -> u64 {
    5
}

fn default_postgres_statement_timeout_ms() -> u64 {
    5_000
}

fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_jwt_expiration_hours() -> u64 {
    24
}

fn default_repository_timeout_ms() -> u64 {
    5_000
}

fn default_notification_timeout_ms() -> u64 {
    5_000
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "parcel-all-in-one".to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("PARCEL"))
            .build()?
            .try_deserialize()
    }

    pub fn ignored_paths(&self) -> Vec<String> {
        self.http_ignored_paths
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

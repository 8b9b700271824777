use serde::{Deserialize, Serialize};

/// PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_pool_size: usize,
    /// Per-connection timeout for establishing a session, in seconds
    pub connect_timeout_secs: u64,
    /// Server-side `statement_timeout`, in milliseconds. Zero disables it.
    pub statement_timeout_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "parcel".to_string(),
            username: "parcel".to_string(),
            password: "parcel".to_string(),
            max_pool_size: 10,
            connect_timeout_secs: 5,
            statement_timeout_ms: 5_000,
        }
    }
}

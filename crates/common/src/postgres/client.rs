use std::time::Duration;

use anyhow::Result;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::debug;

use super::PostgresConfig;
use crate::domain::DomainError;

/// PostgreSQL client wrapper with connection pooling
#[derive(Clone)]
pub struct PostgresClient {
    pool: Pool,
}

impl PostgresClient {
    /// Creates a pooled client. No connection is opened until first use.
    pub fn new(config: &PostgresConfig) -> Result<Self> {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.database.clone());
        cfg.user = Some(config.username.clone());
        cfg.password = Some(config.password.clone());
        cfg.connect_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
        if config.statement_timeout_ms > 0 {
            cfg.options = Some(format!(
                "-c statement_timeout={}",
                config.statement_timeout_ms
            ));
        }
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
        pool.resize(config.max_pool_size);

        Ok(Self { pool })
    }

    /// Pings the database to verify connectivity
    pub async fn ping(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client.execute("SELECT 1", &[]).await?;
        debug!("postgreSQL connection successful");
        Ok(())
    }

    /// Gets a connection from the pool
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Client> {
        Ok(self.pool.get().await?)
    }
}

/// Rejections caused by the submitted values rather than by the store
fn rejected_input_message(sqlstate: &str, constraint: Option<&str>) -> Option<String> {
    match sqlstate {
        // check_violation
        "23514" => Some(format!(
            "constraint {} violated",
            constraint.unwrap_or("unknown")
        )),
        // numeric_value_out_of_range
        "22003" => Some("numeric value out of range for storage".to_string()),
        _ => None,
    }
}

/// Map input rejections onto `ValidationError`; everything else is a repository failure
pub(crate) fn map_db_error(e: tokio_postgres::Error) -> DomainError {
    if let Some(db_err) = e.as_db_error() {
        if let Some(message) = rejected_input_message(db_err.code().code(), db_err.constraint()) {
            return DomainError::ValidationError(message);
        }
    }
    DomainError::RepositoryError(e.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_and_check_violations_are_input_errors() {
        assert_eq!(
            rejected_input_message("22003", None).as_deref(),
            Some("numeric value out of range for storage")
        );
        assert_eq!(
            rejected_input_message("23514", Some("parcels_weight_kg_check")).as_deref(),
            Some("constraint parcels_weight_kg_check violated")
        );
    }

    #[test]
    fn test_other_sqlstates_stay_repository_errors() {
        // unique_violation is handled by the caller, connection failures are retryable
        assert!(rejected_input_message("23505", None).is_none());
        assert!(rejected_input_message("08006", None).is_none());
    }
}

//! Embedded schema migrations.
//!
//! Files keep the goose layout (`-- +goose Up` / `-- +goose Down`) so they can
//! still be applied by hand with the goose CLI. At start-up only the `Up`
//! section of each pending file runs, one transaction per file, and the
//! applied version is recorded in `schema_migrations`.

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::PostgresClient;

/// Arbitrary key for the advisory lock serialising concurrent migrators
const MIGRATION_LOCK_KEY: i64 = 0x7061_7263_656c;

const UP_MARKER: &str = "-- +goose Up";
const DOWN_MARKER: &str = "-- +goose Down";

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_pricing_tiers",
        sql: include_str!("../../migrations/postgres/00001_create_pricing_tiers.sql"),
    },
    Migration {
        version: 2,
        name: "create_parcels",
        sql: include_str!("../../migrations/postgres/00002_create_parcels.sql"),
    },
    Migration {
        version: 3,
        name: "create_parcel_history",
        sql: include_str!("../../migrations/postgres/00003_create_parcel_history.sql"),
    },
    Migration {
        version: 4,
        name: "create_tamper_alerts",
        sql: include_str!("../../migrations/postgres/00004_create_tamper_alerts.sql"),
    },
];

/// Extract the statements between the `Up` and `Down` markers
pub fn up_section(sql: &str) -> &str {
    let start = sql
        .find(UP_MARKER)
        .map(|idx| idx + UP_MARKER.len())
        .unwrap_or(0);
    let rest = &sql[start..];
    let end = rest.find(DOWN_MARKER).unwrap_or(rest.len());
    rest[..end].trim()
}

/// Apply every pending migration. Returns how many were applied.
pub async fn run_migrations(client: &PostgresClient) -> Result<usize> {
    let mut conn = client.get_connection().await?;

    conn.batch_execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version BIGINT PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .await
    .context("failed to create schema_migrations table")?;

    let mut applied = 0;
    for migration in MIGRATIONS {
        let transaction = conn.transaction().await?;

        transaction
            .execute("SELECT pg_advisory_xact_lock($1)", &[&MIGRATION_LOCK_KEY])
            .await?;

        let already_applied = transaction
            .query_opt(
                "SELECT 1 FROM schema_migrations WHERE version = $1",
                &[&migration.version],
            )
            .await?
            .is_some();

        if already_applied {
            debug!(version = migration.version, name = migration.name, "migration already applied");
            transaction.commit().await?;
            continue;
        }

        transaction
            .batch_execute(up_section(migration.sql))
            .await
            .with_context(|| format!("migration {} ({}) failed", migration.version, migration.name))?;

        transaction
            .execute(
                "INSERT INTO schema_migrations (version, name) VALUES ($1, $2)",
                &[&migration.version, &migration.name],
            )
            .await?;

        transaction.commit().await?;
        applied += 1;
        info!(version = migration.version, name = migration.name, "applied migration");
    }

    Ok(applied)
}

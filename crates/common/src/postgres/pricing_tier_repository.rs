use crate::domain::{
    CreatePricingTierRepoInput, DomainError, DomainResult, PricingTier, PricingTierRepository,
};
use crate::postgres::{PostgresClient, map_db_error};
use async_trait::async_trait;
use tokio_postgres::Row;
use tracing::{debug, info, instrument};

const TIER_COLUMNS: &str =
    "id, name, base_price, price_per_kg, estimated_delivery_days, is_active, description";

fn tier_from_row(row: &Row) -> PricingTier {
    PricingTier {
        id: row.get("id"),
        name: row.get("name"),
        base_price: row.get("base_price"),
        price_per_kg: row.get("price_per_kg"),
        estimated_delivery_days: row.get("estimated_delivery_days"),
        is_active: row.get("is_active"),
        description: row.get("description"),
    }
}

/// PostgreSQL implementation of PricingTierRepository trait
#[derive(Clone)]
pub struct PostgresPricingTierRepository {
    client: PostgresClient,
}

impl PostgresPricingTierRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PricingTierRepository for PostgresPricingTierRepository {
    #[instrument(skip(self))]
    async fn list_active_tiers(&self) -> DomainResult<Vec<PricingTier>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                &format!(
                    "SELECT {TIER_COLUMNS} FROM pricing_tiers WHERE is_active ORDER BY base_price ASC, id ASC"
                ),
                &[],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(rows.iter().map(tier_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn get_tier(&self, id: i32) -> DomainResult<Option<PricingTier>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                &format!("SELECT {TIER_COLUMNS} FROM pricing_tiers WHERE id = $1"),
                &[&id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.as_ref().map(tier_from_row))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_tier(&self, input: CreatePricingTierRepoInput) -> DomainResult<PricingTier> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_one(
                &format!(
                    "INSERT INTO pricing_tiers (name, base_price, price_per_kg, estimated_delivery_days, is_active, description)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     RETURNING {TIER_COLUMNS}"
                ),
                &[
                    &input.name,
                    &input.base_price,
                    &input.price_per_kg,
                    &input.estimated_delivery_days,
                    &input.is_active,
                    &input.description,
                ],
            )
            .await
            .map_err(map_db_error)?;

        let tier = tier_from_row(&row);
        info!(tier_id = tier.id, name = %tier.name, "pricing tier created in database");
        Ok(tier)
    }

    #[instrument(skip(self, tier), fields(tier_id = tier.id))]
    async fn update_tier(&self, tier: PricingTier) -> DomainResult<Option<PricingTier>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                &format!(
                    "UPDATE pricing_tiers
                     SET name = $1, base_price = $2, price_per_kg = $3, estimated_delivery_days = $4,
                         is_active = $5, description = $6
                     WHERE id = $7
                     RETURNING {TIER_COLUMNS}"
                ),
                &[
                    &tier.name,
                    &tier.base_price,
                    &tier.price_per_kg,
                    &tier.estimated_delivery_days,
                    &tier.is_active,
                    &tier.description,
                    &tier.id,
                ],
            )
            .await
            .map_err(map_db_error)?;

        debug!(tier_id = tier.id, found = row.is_some(), "pricing tier update applied");

        Ok(row.as_ref().map(tier_from_row))
    }
}

use crate::domain::result::DomainResult;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Shipping price tier ("Standard", "Express", ...)
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTier {
    pub id: i32,
    pub name: String,
    pub base_price: Decimal,
    pub price_per_kg: Decimal,
    pub estimated_delivery_days: i32,
    pub is_active: bool,
    pub description: Option<String>,
}

/// Repository input for creating a pricing tier (id assigned by the store)
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePricingTierRepoInput {
    pub name: String,
    pub base_price: Decimal,
    pub price_per_kg: Decimal,
    pub estimated_delivery_days: i32,
    pub is_active: bool,
    pub description: Option<String>,
}

/// Repository trait for pricing tier persistence
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PricingTierRepository: Send + Sync {
    /// Active tiers ordered by base price
    async fn list_active_tiers(&self) -> DomainResult<Vec<PricingTier>>;

    async fn get_tier(&self, id: i32) -> DomainResult<Option<PricingTier>>;

    async fn create_tier(&self, input: CreatePricingTierRepoInput) -> DomainResult<PricingTier>;

    /// Replace a tier; returns `None` if no tier has this id
    async fn update_tier(&self, tier: PricingTier) -> DomainResult<Option<PricingTier>>;
}

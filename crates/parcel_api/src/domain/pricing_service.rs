use common::domain::{
    CreatePricingTierRepoInput, DomainError, DomainResult, PricingTier, PricingTierRepository,
    with_deadline,
};
use common::garde::{max_amount, money_amount, parcel_weight};
use garde::Validate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Request to price a shipment
#[derive(Debug, Clone, Validate)]
pub struct CalculateCostRequest {
    #[garde(custom(parcel_weight))]
    pub weight_kg: Decimal,
    #[garde(skip)]
    pub pricing_tier_id: i32,
    // Locations do not influence the price yet; they are carried for a
    // distance component.
    #[garde(skip)]
    pub pickup_location: Option<String>,
    #[garde(skip)]
    pub delivery_location: Option<String>,
}

/// Create or replace the fields of a pricing tier
#[derive(Debug, Clone, Validate)]
pub struct PricingTierRequest {
    #[garde(length(min = 1, max = 100))]
    pub name: String,
    #[garde(custom(money_amount))]
    pub base_price: Decimal,
    #[garde(custom(money_amount))]
    pub price_per_kg: Decimal,
    #[garde(range(min = 1))]
    pub estimated_delivery_days: i32,
    #[garde(skip)]
    pub is_active: bool,
    #[garde(skip)]
    pub description: Option<String>,
}

/// base + weight × per-kg, rounded to cents (midpoint away from zero).
/// A cost beyond the largest storable amount is a `ValidationError`.
pub fn shipping_cost(tier: &PricingTier, weight_kg: Decimal) -> DomainResult<Decimal> {
    weight_kg
        .checked_mul(tier.price_per_kg)
        .and_then(|by_weight| by_weight.checked_add(tier.base_price))
        .map(|cost| cost.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .filter(|cost| *cost <= max_amount())
        .ok_or_else(|| {
            DomainError::ValidationError(format!(
                "weight_kg: shipping cost for {} kg on tier {} exceeds {}",
                weight_kg,
                tier.name,
                max_amount()
            ))
        })
}

/// Service for shipping tiers and cost calculation
pub struct PricingService {
    pricing_tier_repository: Arc<dyn PricingTierRepository>,
    repository_timeout: Duration,
}

impl PricingService {
    pub fn new(
        pricing_tier_repository: Arc<dyn PricingTierRepository>,
        repository_timeout: Duration,
    ) -> Self {
        Self {
            pricing_tier_repository,
            repository_timeout,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_active_tiers(&self) -> DomainResult<Vec<PricingTier>> {
        let tiers = with_deadline(
            self.repository_timeout,
            "list_active_tiers",
            self.pricing_tier_repository.list_active_tiers(),
        )
        .await?;

        debug!(count = tiers.len(), "listed active pricing tiers");
        Ok(tiers)
    }

    #[instrument(skip(self))]
    pub async fn get_tier(&self, id: i32) -> DomainResult<PricingTier> {
        with_deadline(
            self.repository_timeout,
            "get_tier",
            self.pricing_tier_repository.get_tier(id),
        )
        .await?
        .ok_or_else(|| DomainError::PricingTierNotFound(id.to_string()))
    }

    /// Price a shipment. Unknown and retired tiers are both `PricingTierNotFound`.
    #[instrument(skip(self, request), fields(pricing_tier_id = request.pricing_tier_id, weight_kg = %request.weight_kg))]
    pub async fn calculate_cost(&self, request: CalculateCostRequest) -> DomainResult<Decimal> {
        common::garde::validate_struct(&request)?;

        let tier = self.get_tier(request.pricing_tier_id).await?;
        if !tier.is_active {
            return Err(DomainError::PricingTierNotFound(tier.id.to_string()));
        }

        let cost = shipping_cost(&tier, request.weight_kg)?;
        debug!(tier = %tier.name, cost = %cost, "calculated shipping cost");
        Ok(cost)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_tier(&self, request: PricingTierRequest) -> DomainResult<PricingTier> {
        common::garde::validate_struct(&request)?;

        let tier = with_deadline(
            self.repository_timeout,
            "create_tier",
            self.pricing_tier_repository
                .create_tier(CreatePricingTierRepoInput {
                    name: request.name,
                    base_price: request.base_price,
                    price_per_kg: request.price_per_kg,
                    estimated_delivery_days: request.estimated_delivery_days,
                    is_active: request.is_active,
                    description: request.description,
                }),
        )
        .await?;

        info!(tier_id = tier.id, name = %tier.name, "pricing tier created");
        Ok(tier)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn update_tier(&self, id: i32, request: PricingTierRequest) -> DomainResult<PricingTier> {
        common::garde::validate_struct(&request)?;

        let tier = PricingTier {
            id,
            name: request.name,
            base_price: request.base_price,
            price_per_kg: request.price_per_kg,
            estimated_delivery_days: request.estimated_delivery_days,
            is_active: request.is_active,
            description: request.description,
        };

        let updated = with_deadline(
            self.repository_timeout,
            "update_tier",
            self.pricing_tier_repository.update_tier(tier),
        )
        .await?
        .ok_or_else(|| DomainError::PricingTierNotFound(id.to_string()))?;

        info!(tier_id = updated.id, "pricing tier updated");
        Ok(updated)
    }
}

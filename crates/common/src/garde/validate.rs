//! Garde validation utilities.

use crate::domain::DomainError;
use garde::{Report, Validate};
use rust_decimal::Decimal;

/// Convert garde validation report to DomainError
pub fn validate_struct<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(format_validation_errors(&report)))
}

/// Custom garde rule for weights and prices that must be strictly positive
pub fn positive_decimal(value: &Decimal, _ctx: &()) -> garde::Result {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        Err(garde::Error::new("must be greater than zero"))
    }
}

/// Custom garde rule for amounts that may be zero but never negative
pub fn non_negative_decimal(value: &Decimal, _ctx: &()) -> garde::Result {
    if *value >= Decimal::ZERO {
        Ok(())
    } else {
        Err(garde::Error::new("must not be negative"))
    }
}

/// Weights are stored as `NUMERIC(12, 3)`
pub const WEIGHT_SCALE: u32 = 3;

/// Money is stored as `NUMERIC(12, 2)`
pub const AMOUNT_SCALE: u32 = 2;

/// Largest weight the parcel store holds: 999 999 999.999 kg
pub fn max_weight_kg() -> Decimal {
    Decimal::new(999_999_999_999, WEIGHT_SCALE)
}

/// Largest amount a price or shipping cost column holds: 9 999 999 999.99
pub fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999, AMOUNT_SCALE)
}

fn check_storable(value: &Decimal, scale: u32, max: Decimal) -> garde::Result {
    if value.normalize().scale() > scale {
        return Err(garde::Error::new(format!(
            "must have at most {} decimal places",
            scale
        )));
    }
    if *value > max {
        return Err(garde::Error::new(format!("must not exceed {}", max)));
    }
    Ok(())
}

/// Custom garde rule for parcel weights: positive and storable without rounding
pub fn parcel_weight(value: &Decimal, ctx: &()) -> garde::Result {
    positive_decimal(value, ctx)?;
    check_storable(value, WEIGHT_SCALE, max_weight_kg())
}

/// Custom garde rule for prices: non-negative and storable without rounding
pub fn money_amount(value: &Decimal, ctx: &()) -> garde::Result {
    non_negative_decimal(value, ctx)?;
    check_storable(value, AMOUNT_SCALE, max_amount())
}

/// Format validation errors from garde Report into a human-readable string
fn format_validation_errors(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            if path.to_string().is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

//! JSON bodies of the parcel API and their mapping from domain types.
//!
//! Monetary amounts and weights travel as decimal strings.

use crate::domain::{DeliveryInitiated, ParcelTracking, TamperOutcome};
use chrono::{DateTime, Utc};
use common::domain::{Parcel, ParcelHistoryEntry, ParcelStatus, PricingTier, TamperAlert};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateParcelBody {
    pub recipient_email: String,
    pub description: Option<String>,
    pub weight_kg: Decimal,
    pub pickup_location: String,
    pub delivery_location: String,
    pub expected_pickup_at: DateTime<Utc>,
    pub expected_delivery_at: DateTime<Utc>,
    pub pricing_tier_id: Option<i32>,
}

/// Optional body for scan, hand-over and initiate-delivery
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandlerActionBody {
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
    pub actual_pickup_at: Option<DateTime<Utc>>,
    pub actual_delivery_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyDeliveryBody {
    pub tracking_code: String,
    pub code: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportTamperBody {
    pub tracking_code: String,
    pub reason: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveTamperBody {
    pub tracking_code: String,
    pub resolution: String,
    pub next_status: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalculateCostBody {
    pub weight_kg: Decimal,
    pub pricing_tier_id: i32,
    pub pickup_location: Option<String>,
    pub delivery_location: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingTierBody {
    pub name: String,
    pub base_price: Decimal,
    pub price_per_kg: Decimal,
    pub estimated_delivery_days: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub description: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

/// Full parcel record. The delivery code itself is never serialised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelResponse {
    pub id: String,
    pub tracking_code: String,
    pub sender_id: String,
    pub sender_email: String,
    pub recipient_email: String,
    pub description: Option<String>,
    pub weight_kg: Decimal,
    pub pickup_location: String,
    pub delivery_location: String,
    pub expected_pickup_at: DateTime<Utc>,
    pub expected_delivery_at: DateTime<Utc>,
    pub actual_pickup_at: Option<DateTime<Utc>>,
    pub actual_delivery_at: Option<DateTime<Utc>>,
    pub status: ParcelStatus,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub otp_verified: bool,
    pub pricing_tier_id: Option<i32>,
    pub shipping_cost: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Parcel> for ParcelResponse {
    fn from(parcel: Parcel) -> Self {
        let otp_expires_at = parcel.otp.as_ref().map(|otp| otp.expires_at());
        let otp_verified = parcel.otp.as_ref().is_some_and(|otp| otp.verified);

        ParcelResponse {
            id: parcel.id,
            tracking_code: parcel.tracking_code,
            sender_id: parcel.sender_id,
            sender_email: parcel.sender_email,
            recipient_email: parcel.recipient_email,
            description: parcel.description,
            weight_kg: parcel.weight_kg,
            pickup_location: parcel.pickup_location,
            delivery_location: parcel.delivery_location,
            expected_pickup_at: parcel.expected_pickup_at,
            expected_delivery_at: parcel.expected_delivery_at,
            actual_pickup_at: parcel.actual_pickup_at,
            actual_delivery_at: parcel.actual_delivery_at,
            status: parcel.status,
            otp_expires_at,
            otp_verified,
            pricing_tier_id: parcel.pricing_tier_id,
            shipping_cost: parcel.shipping_cost,
            created_at: parcel.created_at,
            updated_at: parcel.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingResponse {
    pub tracking_code: String,
    pub status: ParcelStatus,
    pub delivery_location: String,
    pub expected_pickup_at: DateTime<Utc>,
    pub expected_delivery_at: DateTime<Utc>,
    pub actual_pickup_at: Option<DateTime<Utc>>,
    pub actual_delivery_at: Option<DateTime<Utc>>,
}

impl From<ParcelTracking> for TrackingResponse {
    fn from(tracking: ParcelTracking) -> Self {
        TrackingResponse {
            tracking_code: tracking.tracking_code,
            status: tracking.status,
            delivery_location: tracking.delivery_location,
            expected_pickup_at: tracking.expected_pickup_at,
            expected_delivery_at: tracking.expected_delivery_at,
            actual_pickup_at: tracking.actual_pickup_at,
            actual_delivery_at: tracking.actual_delivery_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntryResponse {
    pub id: i64,
    pub status: ParcelStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub handled_by: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl From<ParcelHistoryEntry> for HistoryEntryResponse {
    fn from(entry: ParcelHistoryEntry) -> Self {
        HistoryEntryResponse {
            id: entry.id,
            status: entry.status,
            location: entry.location,
            notes: entry.notes,
            handled_by: entry.handled_by,
            recorded_at: entry.recorded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryInitiatedResponse {
    pub parcel: ParcelResponse,
    pub recipient_notified: bool,
}

impl From<DeliveryInitiated> for DeliveryInitiatedResponse {
    fn from(outcome: DeliveryInitiated) -> Self {
        DeliveryInitiatedResponse {
            parcel: outcome.parcel.into(),
            recipient_notified: outcome.recipient_notified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TamperOutcomeResponse {
    pub parcel: ParcelResponse,
    pub alert_id: String,
    pub sender_notified: bool,
}

impl From<TamperOutcome> for TamperOutcomeResponse {
    fn from(outcome: TamperOutcome) -> Self {
        TamperOutcomeResponse {
            parcel: outcome.parcel.into(),
            alert_id: outcome.alert_id,
            sender_notified: outcome.sender_notified,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TamperAlertResponse {
    pub id: String,
    pub tracking_code: String,
    pub reason: String,
    pub location: Option<String>,
    pub reported_by: Option<String>,
    pub detected_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolution: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<TamperAlert> for TamperAlertResponse {
    fn from(alert: TamperAlert) -> Self {
        TamperAlertResponse {
            id: alert.id,
            tracking_code: alert.tracking_code,
            reason: alert.reason,
            location: alert.location,
            reported_by: alert.reported_by,
            detected_at: alert.detected_at,
            resolved: alert.resolved,
            resolution: alert.resolution,
            resolved_by: alert.resolved_by,
            resolved_at: alert.resolved_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingTierResponse {
    pub id: i32,
    pub name: String,
    pub base_price: Decimal,
    pub price_per_kg: Decimal,
    pub estimated_delivery_days: i32,
    pub is_active: bool,
    pub description: Option<String>,
}

impl From<PricingTier> for PricingTierResponse {
    fn from(tier: PricingTier) -> Self {
        PricingTierResponse {
            id: tier.id,
            name: tier.name,
            base_price: tier.base_price,
            price_per_kg: tier.price_per_kg,
            estimated_delivery_days: tier.estimated_delivery_days,
            is_active: tier.is_active,
            description: tier.description,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostResponse {
    pub pricing_tier_id: i32,
    pub weight_kg: Decimal,
    pub shipping_cost: Decimal,
}

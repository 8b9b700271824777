use crate::domain::result::DomainResult;
use crate::domain::{
    DeliveryOtp, NewHistoryEntry, ParcelHistoryEntry, ParcelStatus, TamperAlert,
    TamperAlertChange,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Parcel aggregate root
#[derive(Debug, Clone, PartialEq)]
pub struct Parcel {
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
    pub otp: Option<DeliveryOtp>,
    pub pricing_tier_id: Option<i32>,
    pub shipping_cost: Option<Decimal>,
    /// Bumped by the store on every commit; used for compare-and-set
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository input for inserting a new parcel with its first history entry
#[derive(Debug, Clone, PartialEq)]
pub struct CreateParcelRepoInput {
    pub parcel: Parcel,
    pub initial_history: NewHistoryEntry,
}

/// Everything one accepted operation writes, applied atomically.
///
/// `parcel` carries the new state. The store only applies it when the stored
/// version still equals `expected_version`, and returns the parcel with its
/// version bumped.
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelCommit {
    pub parcel: Parcel,
    pub expected_version: i64,
    pub history: NewHistoryEntry,
    pub tamper: Option<TamperAlertChange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListParcelsFilter {
    All,
    ByStatus(ParcelStatus),
    BySender(String),
}

/// Repository trait for parcel persistence operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ParcelRepository: Send + Sync {
    /// Insert a new parcel. Fails with `TrackingCodeConflict` if the code is taken.
    async fn create_parcel(&self, input: CreateParcelRepoInput) -> DomainResult<Parcel>;

    /// Get a parcel by tracking code
    async fn get_parcel(&self, tracking_code: &str) -> DomainResult<Option<Parcel>>;

    /// Apply a version-checked update, history entry and tamper change together
    async fn commit(&self, commit: ParcelCommit) -> DomainResult<Parcel>;

    /// List parcels, newest first
    async fn list_parcels(&self, filter: ListParcelsFilter) -> DomainResult<Vec<Parcel>>;

    /// History entries for a parcel, oldest first
    async fn list_history(&self, tracking_code: &str) -> DomainResult<Vec<ParcelHistoryEntry>>;

    async fn get_unresolved_tamper_alert(
        &self,
        tracking_code: &str,
    ) -> DomainResult<Option<TamperAlert>>;

    /// All tamper alerts for a parcel, newest first
    async fn list_tamper_alerts(&self, tracking_code: &str) -> DomainResult<Vec<TamperAlert>>;
}

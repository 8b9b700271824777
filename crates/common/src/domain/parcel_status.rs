use crate::domain::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of parcel statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParcelStatus {
    Created,
    Scanned,
    HandedOver,
    InWarehouse,
    OutForDelivery,
    Delivered,
    Returned,
    ReturnedToSender,
    Tampered,
    TamperResolved,
    ReturnedDueToDamage,
    Lost,
}

impl ParcelStatus {
    pub const ALL: [ParcelStatus; 12] = [
        ParcelStatus::Created,
        ParcelStatus::Scanned,
        ParcelStatus::HandedOver,
        ParcelStatus::InWarehouse,
        ParcelStatus::OutForDelivery,
        ParcelStatus::Delivered,
        ParcelStatus::Returned,
        ParcelStatus::ReturnedToSender,
        ParcelStatus::Tampered,
        ParcelStatus::TamperResolved,
        ParcelStatus::ReturnedDueToDamage,
        ParcelStatus::Lost,
    ];

    /// Statuses a tamper resolution may route a parcel into
    pub const TAMPER_RESOLUTION_TARGETS: [ParcelStatus; 3] = [
        ParcelStatus::TamperResolved,
        ParcelStatus::ReturnedDueToDamage,
        ParcelStatus::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParcelStatus::Created => "Created",
            ParcelStatus::Scanned => "Scanned",
            ParcelStatus::HandedOver => "HandedOver",
            ParcelStatus::InWarehouse => "InWarehouse",
            ParcelStatus::OutForDelivery => "OutForDelivery",
            ParcelStatus::Delivered => "Delivered",
            ParcelStatus::Returned => "Returned",
            ParcelStatus::ReturnedToSender => "ReturnedToSender",
            ParcelStatus::Tampered => "Tampered",
            ParcelStatus::TamperResolved => "TamperResolved",
            ParcelStatus::ReturnedDueToDamage => "ReturnedDueToDamage",
            ParcelStatus::Lost => "Lost",
        }
    }

    /// No lifecycle transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ParcelStatus::Delivered
                | ParcelStatus::Returned
                | ParcelStatus::ReturnedDueToDamage
                | ParcelStatus::Lost
        )
    }

    pub fn is_tamper_resolution_target(&self) -> bool {
        Self::TAMPER_RESOLUTION_TARGETS.contains(self)
    }
}

impl fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses canonical names case-insensitively, ignoring spaces, `_` and `-`
/// so that spellings like "Out for Delivery" resolve to the same variant.
impl FromStr for ParcelStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .map(|c| c.to_ascii_lowercase())
            .collect();

        Self::ALL
            .into_iter()
            .find(|status| status.as_str().to_ascii_lowercase() == normalized)
            .ok_or_else(|| DomainError::ValidationError(format!("Unknown parcel status: {}", s)))
    }
}

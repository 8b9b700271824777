use crate::domain::ParcelStatus;
use chrono::{DateTime, Utc};

/// Immutable audit record of one accepted lifecycle operation
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelHistoryEntry {
    pub id: i64,
    pub tracking_code: String,
    pub status: ParcelStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub handled_by: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// History entry before the store assigns its id
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub tracking_code: String,
    pub status: ParcelStatus,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub handled_by: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl NewHistoryEntry {
    pub fn into_entry(self, id: i64) -> ParcelHistoryEntry {
        ParcelHistoryEntry {
            id,
            tracking_code: self.tracking_code,
            status: self.status,
            location: self.location,
            notes: self.notes,
            handled_by: self.handled_by,
            recorded_at: self.recorded_at,
        }
    }
}

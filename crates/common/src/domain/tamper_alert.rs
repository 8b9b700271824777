use chrono::{DateTime, Utc};

/// Record of one suspected tampering incident
#[derive(Debug, Clone, PartialEq)]
pub struct TamperAlert {
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

/// Input for opening a new tamper alert
#[derive(Debug, Clone, PartialEq)]
pub struct NewTamperAlert {
    pub id: String,
    pub tracking_code: String,
    pub reason: String,
    pub location: Option<String>,
    pub reported_by: Option<String>,
    pub detected_at: DateTime<Utc>,
}

impl From<NewTamperAlert> for TamperAlert {
    fn from(alert: NewTamperAlert) -> Self {
        TamperAlert {
            id: alert.id,
            tracking_code: alert.tracking_code,
            reason: alert.reason,
            location: alert.location,
            reported_by: alert.reported_by,
            detected_at: alert.detected_at,
            resolved: false,
            resolution: None,
            resolved_by: None,
            resolved_at: None,
        }
    }
}

/// Input for closing an open tamper alert
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveTamperAlert {
    pub alert_id: String,
    pub resolution: String,
    pub resolved_by: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

/// Tamper record mutation carried inside a parcel commit
#[derive(Debug, Clone, PartialEq)]
pub enum TamperAlertChange {
    Open(NewTamperAlert),
    Resolve(ResolveTamperAlert),
}

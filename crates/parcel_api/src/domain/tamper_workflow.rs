use crate::domain::{LifecycleAction, ParcelChange, ParcelLedger, check_transition};
use common::domain::{
    DomainError, DomainResult, NewTamperAlert, NotificationMessage, Parcel, ParcelStatus,
    ResolveTamperAlert, TamperAlert, TamperAlertChange,
};
use garde::Validate;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Validate)]
pub struct ReportTamperingRequest {
    #[garde(length(min = 1))]
    pub tracking_code: String,
    #[garde(length(min = 1), custom(not_blank))]
    pub reason: String,
    #[garde(skip)]
    pub location: Option<String>,
    #[garde(skip)]
    pub reported_by: Option<String>,
}

#[derive(Debug, Clone, Validate)]
pub struct ResolveTamperingRequest {
    #[garde(length(min = 1))]
    pub tracking_code: String,
    #[garde(length(min = 1), custom(not_blank))]
    pub resolution: String,
    /// Raw status text; parsed and checked against the resolution targets
    #[garde(length(min = 1))]
    pub next_status: String,
    #[garde(skip)]
    pub location: Option<String>,
    #[garde(skip)]
    pub resolved_by: Option<String>,
}

/// Outcome of a tamper operation
#[derive(Debug, Clone)]
pub struct TamperOutcome {
    pub parcel: Parcel,
    pub alert_id: String,
    /// Whether the sender notification went out
    pub sender_notified: bool,
}

fn not_blank(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        Err(garde::Error::new("must not be blank"))
    } else {
        Ok(())
    }
}

/// Whether a tampered parcel may be resolved into `status`
pub fn is_valid_resolution_target(status: ParcelStatus) -> bool {
    status.is_tamper_resolution_target()
}

/// Suspends delivery when tampering is suspected and requires an explicit resolution
pub struct TamperWorkflow {
    ledger: Arc<ParcelLedger>,
}

impl TamperWorkflow {
    pub fn new(ledger: Arc<ParcelLedger>) -> Self {
        Self { ledger }
    }

    /// Open an alert and force the parcel into `Tampered`.
    ///
    /// A parcel with an unresolved alert cannot be reported again; the second
    /// report fails with `TamperAlertAlreadyOpen` and changes nothing.
    #[instrument(skip(self, request), fields(tracking_code = %request.tracking_code))]
    pub async fn report(&self, request: ReportTamperingRequest) -> DomainResult<TamperOutcome> {
        common::garde::validate_struct(&request)?;

        let parcel = self.ledger.load(&request.tracking_code).await?;
        if parcel.status == ParcelStatus::Delivered {
            return Err(DomainError::AlreadyDelivered(parcel.tracking_code));
        }
        check_transition(LifecycleAction::ReportTampering, parcel.status)?;

        if self
            .ledger
            .unresolved_alert(&parcel.tracking_code)
            .await?
            .is_some()
        {
            return Err(DomainError::TamperAlertAlreadyOpen(parcel.tracking_code));
        }

        let now = self.ledger.now();
        let reason = request.reason.trim().to_string();
        let alert = NewTamperAlert {
            id: xid::new().to_string(),
            tracking_code: parcel.tracking_code.clone(),
            reason: reason.clone(),
            location: request.location.clone(),
            reported_by: request.reported_by.clone(),
            detected_at: now,
        };
        let alert_id = alert.id.clone();

        debug!(previous_status = %parcel.status, alert_id = %alert_id, "reporting tampering");

        let mut next = parcel.clone();
        next.status = ParcelStatus::Tampered;

        let parcel = self
            .ledger
            .record(ParcelChange {
                loaded_version: parcel.version,
                parcel: next,
                location: request.location,
                notes: Some(format!("TAMPERING DETECTED: {}", reason)),
                handled_by: request.reported_by,
                tamper: Some(TamperAlertChange::Open(alert)),
            })
            .await?;

        info!(tracking_code = %parcel.tracking_code, alert_id = %alert_id, "tampering reported");

        let sender_notified = self
            .ledger
            .notify(NotificationMessage {
                address: parcel.sender_email.clone(),
                subject: format!("ALERT: Package Tampering Detected - {}", parcel.tracking_code),
                body: format!(
                    "Tampering has been detected with your parcel {}.\nReason: {}\nThis issue has been flagged for investigation.",
                    parcel.tracking_code, reason
                ),
            })
            .await;

        Ok(TamperOutcome {
            parcel,
            alert_id,
            sender_notified,
        })
    }

    /// Close the open alert and route the parcel to the chosen resolution status
    #[instrument(skip(self, request), fields(tracking_code = %request.tracking_code, next_status = %request.next_status))]
    pub async fn resolve(&self, request: ResolveTamperingRequest) -> DomainResult<TamperOutcome> {
        common::garde::validate_struct(&request)?;

        let next_status = ParcelStatus::from_str(&request.next_status)
            .ok()
            .filter(|status| is_valid_resolution_target(*status))
            .ok_or_else(|| DomainError::InvalidResolutionTarget(request.next_status.clone()))?;

        let parcel = self.ledger.load(&request.tracking_code).await?;
        if parcel.status != ParcelStatus::Tampered {
            return Err(DomainError::InvalidTransition {
                from: parcel.status,
                to: next_status,
            });
        }

        // A tampered parcel without an open alert means the alert was closed
        // concurrently; the status we loaded is already stale.
        let alert = self
            .ledger
            .unresolved_alert(&parcel.tracking_code)
            .await?
            .ok_or_else(|| DomainError::ConcurrentModification(parcel.tracking_code.clone()))?;

        let resolution = request.resolution.trim().to_string();
        let mut next = parcel.clone();
        next.status = next_status;

        let parcel = self
            .ledger
            .record(ParcelChange {
                loaded_version: parcel.version,
                parcel: next,
                location: request.location,
                notes: Some(format!("TAMPER RESOLVED: {}", resolution)),
                handled_by: request.resolved_by.clone(),
                tamper: Some(TamperAlertChange::Resolve(ResolveTamperAlert {
                    alert_id: alert.id.clone(),
                    resolution: resolution.clone(),
                    resolved_by: request.resolved_by,
                    resolved_at: self.ledger.now(),
                })),
            })
            .await?;

        info!(tracking_code = %parcel.tracking_code, status = %parcel.status, "tampering resolved");

        let sender_notified = self
            .ledger
            .notify(NotificationMessage {
                address: parcel.sender_email.clone(),
                subject: format!("Update: Package Tampering Resolution - {}", parcel.tracking_code),
                body: format!(
                    "The tampering issue with your parcel {} has been addressed.\nResolution: {}\nNew status: {}",
                    parcel.tracking_code, resolution, parcel.status
                ),
            })
            .await;

        Ok(TamperOutcome {
            parcel,
            alert_id: alert.id,
            sender_notified,
        })
    }

    /// Every alert raised for a parcel, newest first
    #[instrument(skip(self))]
    pub async fn list_alerts(&self, tracking_code: &str) -> DomainResult<Vec<TamperAlert>> {
        self.ledger.load(tracking_code).await?;
        self.ledger.alerts(tracking_code).await
    }
}

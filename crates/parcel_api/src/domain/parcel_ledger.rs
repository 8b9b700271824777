use chrono::{DateTime, Utc};
use common::domain::{
    Clock, CreateParcelRepoInput, DomainError, DomainResult, ListParcelsFilter, NewHistoryEntry,
    NotificationDispatcher, NotificationMessage, Parcel, ParcelCommit, ParcelHistoryEntry,
    ParcelRepository, TamperAlert, TamperAlertChange, dispatch_best_effort, with_deadline,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Bounds applied to every outbound call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTimeouts {
    pub repository: Duration,
    pub notification: Duration,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            repository: Duration::from_secs(5),
            notification: Duration::from_secs(5),
        }
    }
}

/// One accepted operation: the parcel's new state plus what to record about it
#[derive(Debug, Clone)]
pub struct ParcelChange {
    /// Version the caller loaded; the commit fails if the store moved on
    pub loaded_version: i64,
    pub parcel: Parcel,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub handled_by: Option<String>,
    pub tamper: Option<TamperAlertChange>,
}

/// Shared access to parcel storage, time and notifications.
///
/// Every repository call goes through a deadline, and every accepted change is
/// written together with exactly one history entry.
pub struct ParcelLedger {
    repository: Arc<dyn ParcelRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    timeouts: OperationTimeouts,
}

impl ParcelLedger {
    pub fn new(
        repository: Arc<dyn ParcelRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        timeouts: OperationTimeouts,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            clock,
            timeouts,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Load a parcel or fail with `ParcelNotFound`
    pub async fn load(&self, tracking_code: &str) -> DomainResult<Parcel> {
        with_deadline(
            self.timeouts.repository,
            "get_parcel",
            self.repository.get_parcel(tracking_code),
        )
        .await?
        .ok_or_else(|| DomainError::ParcelNotFound(tracking_code.to_string()))
    }

    pub async fn create(&self, input: CreateParcelRepoInput) -> DomainResult<Parcel> {
        with_deadline(
            self.timeouts.repository,
            "create_parcel",
            self.repository.create_parcel(input),
        )
        .await
    }

    /// Persist `change` and its history entry atomically
    pub async fn record(&self, change: ParcelChange) -> DomainResult<Parcel> {
        let now = self.now();
        let mut parcel = change.parcel;
        parcel.updated_at = now;

        let history = NewHistoryEntry {
            tracking_code: parcel.tracking_code.clone(),
            status: parcel.status,
            location: change.location,
            notes: change.notes,
            handled_by: change.handled_by,
            recorded_at: now,
        };

        debug!(
            tracking_code = %parcel.tracking_code,
            status = %parcel.status,
            loaded_version = change.loaded_version,
            "recording parcel change"
        );

        with_deadline(
            self.timeouts.repository,
            "commit",
            self.repository.commit(ParcelCommit {
                parcel,
                expected_version: change.loaded_version,
                history,
                tamper: change.tamper,
            }),
        )
        .await
    }

    pub async fn history(&self, tracking_code: &str) -> DomainResult<Vec<ParcelHistoryEntry>> {
        with_deadline(
            self.timeouts.repository,
            "list_history",
            self.repository.list_history(tracking_code),
        )
        .await
    }

    pub async fn list(&self, filter: ListParcelsFilter) -> DomainResult<Vec<Parcel>> {
        with_deadline(
            self.timeouts.repository,
            "list_parcels",
            self.repository.list_parcels(filter),
        )
        .await
    }

    pub async fn unresolved_alert(&self, tracking_code: &str) -> DomainResult<Option<TamperAlert>> {
        with_deadline(
            self.timeouts.repository,
            "get_unresolved_tamper_alert",
            self.repository.get_unresolved_tamper_alert(tracking_code),
        )
        .await
    }

    pub async fn alerts(&self, tracking_code: &str) -> DomainResult<Vec<TamperAlert>> {
        with_deadline(
            self.timeouts.repository,
            "list_tamper_alerts",
            self.repository.list_tamper_alerts(tracking_code),
        )
        .await
    }

    /// Best-effort send; returns whether the message went out
    pub async fn notify(&self, message: NotificationMessage) -> bool {
        dispatch_best_effort(self.dispatcher.as_ref(), message, self.timeouts.notification).await
    }
}

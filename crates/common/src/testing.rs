//! In-memory doubles for scenario tests. They keep the same atomicity and
//! version-check semantics as the PostgreSQL repositories.

use crate::domain::{
    Clock, CreateParcelRepoInput, CreatePricingTierRepoInput, DomainError, DomainResult,
    ListParcelsFilter, NotificationDispatcher, NotificationMessage, OtpCodeSource, Parcel,
    ParcelCommit, ParcelHistoryEntry, ParcelRepository, PricingTier, PricingTierRepository,
    TamperAlert, TamperAlertChange,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Default)]
struct ParcelStore {
    parcels: HashMap<String, Parcel>,
    history: Vec<ParcelHistoryEntry>,
    alerts: Vec<TamperAlert>,
    next_history_id: i64,
}

impl ParcelStore {
    fn append_history(&mut self, entry: crate::domain::NewHistoryEntry) {
        self.next_history_id += 1;
        let id = self.next_history_id;
        self.history.push(entry.into_entry(id));
    }
}

#[derive(Default)]
pub struct InMemoryParcelRepository {
    store: Mutex<ParcelStore>,
}

impl InMemoryParcelRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every history entry across all parcels, in append order
    pub fn all_history(&self) -> Vec<ParcelHistoryEntry> {
        self.store.lock().unwrap().history.clone()
    }
}

#[async_trait]
impl ParcelRepository for InMemoryParcelRepository {
    async fn create_parcel(&self, input: CreateParcelRepoInput) -> DomainResult<Parcel> {
        let mut store = self.store.lock().unwrap();
        let code = input.parcel.tracking_code.clone();
        if store.parcels.contains_key(&code) {
            return Err(DomainError::TrackingCodeConflict(code));
        }
        store.parcels.insert(code, input.parcel.clone());
        store.append_history(input.initial_history);
        Ok(input.parcel)
    }

    async fn get_parcel(&self, tracking_code: &str) -> DomainResult<Option<Parcel>> {
        Ok(self.store.lock().unwrap().parcels.get(tracking_code).cloned())
    }

    async fn commit(&self, commit: ParcelCommit) -> DomainResult<Parcel> {
        let mut store = self.store.lock().unwrap();
        let code = commit.parcel.tracking_code.clone();

        let current_version = match store.parcels.get(&code) {
            Some(parcel) => parcel.version,
            None => return Err(DomainError::ParcelNotFound(code)),
        };
        if current_version != commit.expected_version {
            return Err(DomainError::ConcurrentModification(code));
        }

        // Validate the tamper change before touching anything
        let resolve_index = match &commit.tamper {
            Some(TamperAlertChange::Open(_)) => {
                if store
                    .alerts
                    .iter()
                    .any(|a| a.tracking_code == code && !a.resolved)
                {
                    return Err(DomainError::TamperAlertAlreadyOpen(code));
                }
                None
            }
            Some(TamperAlertChange::Resolve(resolve)) => {
                let index = store
                    .alerts
                    .iter()
                    .position(|a| a.id == resolve.alert_id && !a.resolved)
                    .ok_or_else(|| DomainError::ConcurrentModification(code.clone()))?;
                Some(index)
            }
            None => None,
        };

        let mut parcel = commit.parcel;
        parcel.version = current_version + 1;
        store.parcels.insert(code, parcel.clone());
        store.append_history(commit.history);

        match commit.tamper {
            Some(TamperAlertChange::Open(alert)) => store.alerts.push(alert.into()),
            Some(TamperAlertChange::Resolve(resolve)) => {
                if let Some(alert) = resolve_index.and_then(|i| store.alerts.get_mut(i)) {
                    alert.resolved = true;
                    alert.resolution = Some(resolve.resolution);
                    alert.resolved_by = resolve.resolved_by;
                    alert.resolved_at = Some(resolve.resolved_at);
                }
            }
            None => {}
        }

        Ok(parcel)
    }

    async fn list_parcels(&self, filter: ListParcelsFilter) -> DomainResult<Vec<Parcel>> {
        let store = self.store.lock().unwrap();
        let mut parcels: Vec<Parcel> = store
            .parcels
            .values()
            .filter(|p| match &filter {
                ListParcelsFilter::All => true,
                ListParcelsFilter::ByStatus(status) => p.status == *status,
                ListParcelsFilter::BySender(sender_id) => p.sender_id == *sender_id,
            })
            .cloned()
            .collect();
        parcels.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(parcels)
    }

    async fn list_history(&self, tracking_code: &str) -> DomainResult<Vec<ParcelHistoryEntry>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .history
            .iter()
            .filter(|h| h.tracking_code == tracking_code)
            .cloned()
            .collect())
    }

    async fn get_unresolved_tamper_alert(
        &self,
        tracking_code: &str,
    ) -> DomainResult<Option<TamperAlert>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .alerts
            .iter()
            .find(|a| a.tracking_code == tracking_code && !a.resolved)
            .cloned())
    }

    async fn list_tamper_alerts(&self, tracking_code: &str) -> DomainResult<Vec<TamperAlert>> {
        let store = self.store.lock().unwrap();
        // Reverse first so equal timestamps keep newest-inserted first after the stable sort
        let mut alerts: Vec<TamperAlert> = store
            .alerts
            .iter()
            .rev()
            .filter(|a| a.tracking_code == tracking_code)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(alerts)
    }
}

#[derive(Default)]
pub struct InMemoryPricingTierRepository {
    tiers: Mutex<Vec<PricingTier>>,
}

impl InMemoryPricingTierRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PricingTierRepository for InMemoryPricingTierRepository {
    async fn list_active_tiers(&self) -> DomainResult<Vec<PricingTier>> {
        let mut tiers: Vec<PricingTier> = self
            .tiers
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.is_active)
            .cloned()
            .collect();
        tiers.sort_by(|a, b| a.base_price.cmp(&b.base_price).then(a.id.cmp(&b.id)));
        Ok(tiers)
    }

    async fn get_tier(&self, id: i32) -> DomainResult<Option<PricingTier>> {
        Ok(self
            .tiers
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn create_tier(&self, input: CreatePricingTierRepoInput) -> DomainResult<PricingTier> {
        let mut tiers = self.tiers.lock().unwrap();
        let tier = PricingTier {
            id: tiers.iter().map(|t| t.id).max().unwrap_or(0) + 1,
            name: input.name,
            base_price: input.base_price,
            price_per_kg: input.price_per_kg,
            estimated_delivery_days: input.estimated_delivery_days,
            is_active: input.is_active,
            description: input.description,
        };
        tiers.push(tier.clone());
        Ok(tier)
    }

    async fn update_tier(&self, tier: PricingTier) -> DomainResult<Option<PricingTier>> {
        let mut tiers = self.tiers.lock().unwrap();
        match tiers.iter_mut().find(|t| t.id == tier.id) {
            Some(existing) => {
                *existing = tier.clone();
                Ok(Some(tier))
            }
            None => Ok(None),
        }
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Hands out `start`, `start + 1`, ... so each issued code is distinct and predictable
pub struct SequentialOtpCodeSource {
    next: AtomicU32,
}

impl SequentialOtpCodeSource {
    pub fn new(start: u32) -> Self {
        Self {
            next: AtomicU32::new(start),
        }
    }
}

impl OtpCodeSource for SequentialOtpCodeSource {
    fn next_code(&self) -> u32 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

/// Dispatcher that keeps every message it is asked to send
#[derive(Default)]
pub struct RecordingNotificationDispatcher {
    sent: Mutex<Vec<NotificationMessage>>,
    fail: bool,
}

impl RecordingNotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the message, then reports a transport failure
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotificationDispatcher {
    async fn send(&self, message: NotificationMessage) -> DomainResult<()> {
        self.sent.lock().unwrap().push(message);
        if self.fail {
            return Err(DomainError::TransportError(
                "notification relay unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

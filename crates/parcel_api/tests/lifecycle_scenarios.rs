//! End-to-end lifecycle scenarios against the in-memory repository, a manual
//! clock and predictable delivery codes.

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::domain::{
    DomainError, ListParcelsFilter, NotificationDispatcher, ParcelRepository, ParcelStatus,
};
use common::testing::{
    InMemoryParcelRepository, InMemoryPricingTierRepository, ManualClock,
    RecordingNotificationDispatcher, SequentialOtpCodeSource,
};
use parcel_api::domain::{
    CreateParcelRequest, HandlerActionRequest, IssueOtpRequest, OperationTimeouts, OtpVerifier,
    ParcelChange, ParcelLedger, ParcelLifecycleService, PricingService, ReportTamperingRequest,
    ResolveTamperingRequest, TamperWorkflow, UpdateStatusRequest, VerifyOtpRequest,
};
use rust_decimal_macros::dec;
use std::sync::Arc;

const FIRST_CODE: u32 = 100_000;

struct Harness {
    repo: Arc<InMemoryParcelRepository>,
    clock: Arc<ManualClock>,
    dispatcher: Arc<RecordingNotificationDispatcher>,
    ledger: Arc<ParcelLedger>,
    tamper_workflow: Arc<TamperWorkflow>,
    service: ParcelLifecycleService,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

impl Harness {
    fn new() -> Self {
        Self::with_dispatcher(RecordingNotificationDispatcher::new())
    }

    fn with_dispatcher(dispatcher: RecordingNotificationDispatcher) -> Self {
        let repo = Arc::new(InMemoryParcelRepository::new());
        let clock = Arc::new(ManualClock::new(start()));
        let dispatcher = Arc::new(dispatcher);
        let timeouts = OperationTimeouts::default();

        let ledger = Arc::new(ParcelLedger::new(
            repo.clone() as Arc<dyn ParcelRepository>,
            dispatcher.clone() as Arc<dyn NotificationDispatcher>,
            clock.clone(),
            timeouts,
        ));
        let otp_verifier = Arc::new(OtpVerifier::new(
            ledger.clone(),
            Arc::new(SequentialOtpCodeSource::new(FIRST_CODE)),
        ));
        let tamper_workflow = Arc::new(TamperWorkflow::new(ledger.clone()));
        let pricing_service = Arc::new(PricingService::new(
            Arc::new(InMemoryPricingTierRepository::new()),
            timeouts.repository,
        ));

        let service = ParcelLifecycleService::new(
            ledger.clone(),
            otp_verifier,
            tamper_workflow.clone(),
            pricing_service,
        );

        Self {
            repo,
            clock,
            dispatcher,
            ledger,
            tamper_workflow,
            service,
        }
    }

    async fn create(&self) -> String {
        self.service
            .create_parcel(CreateParcelRequest {
                sender_id: "sender-1".to_string(),
                sender_email: "sender@example.com".to_string(),
                recipient_email: "recipient@example.com".to_string(),
                description: Some("Ceramic vase".to_string()),
                weight_kg: dec!(2.5),
                pickup_location: "Depot A".to_string(),
                delivery_location: "12 Harbour Road".to_string(),
                expected_pickup_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                expected_delivery_at: Utc.with_ymd_and_hms(2025, 1, 3, 0, 0, 0).unwrap(),
                pricing_tier_id: None,
            })
            .await
            .unwrap()
            .tracking_code
    }

    async fn status(&self, tracking_code: &str) -> ParcelStatus {
        self.service.get_parcel(tracking_code).await.unwrap().status
    }

    async fn history_len(&self, tracking_code: &str) -> usize {
        self.ledger.history(tracking_code).await.unwrap().len()
    }

    async fn scan(&self, tracking_code: &str) -> Result<ParcelStatus, DomainError> {
        self.service
            .scan(action(tracking_code))
            .await
            .map(|parcel| parcel.status)
    }

    async fn verify(&self, tracking_code: &str, code: u32) -> Result<ParcelStatus, DomainError> {
        self.service
            .verify_delivery(VerifyOtpRequest {
                tracking_code: tracking_code.to_string(),
                code: code.to_string(),
                location: Some("12 Harbour Road".to_string()),
                handled_by: Some("courier-1".to_string()),
            })
            .await
            .map(|parcel| parcel.status)
    }

    async fn report(&self, tracking_code: &str, reason: &str) -> Result<ParcelStatus, DomainError> {
        self.service
            .report_tampering(ReportTamperingRequest {
                tracking_code: tracking_code.to_string(),
                reason: reason.to_string(),
                location: Some("Sorting hub 3".to_string()),
                reported_by: Some("handler-1".to_string()),
            })
            .await
            .map(|outcome| outcome.parcel.status)
    }

    async fn resolve(&self, tracking_code: &str, next_status: &str) -> Result<ParcelStatus, DomainError> {
        self.service
            .resolve_tampering(ResolveTamperingRequest {
                tracking_code: tracking_code.to_string(),
                resolution: "Inspected by supervisor".to_string(),
                next_status: next_status.to_string(),
                location: None,
                resolved_by: Some("admin-1".to_string()),
            })
            .await
            .map(|outcome| outcome.parcel.status)
    }
}

fn action(tracking_code: &str) -> HandlerActionRequest {
    HandlerActionRequest {
        tracking_code: tracking_code.to_string(),
        location: Some("Depot A".to_string()),
        notes: None,
        handled_by: Some("handler-1".to_string()),
    }
}

#[tokio::test]
async fn test_create_initiate_verify_then_tamper_rejected() {
    let h = Harness::new();
    let code = h.create().await;
    assert_eq!(code, "PCL-20250101000000000");
    assert_eq!(h.status(&code).await, ParcelStatus::Created);

    let initiated = h.service.initiate_delivery(action(&code)).await.unwrap();
    assert_eq!(initiated.parcel.status, ParcelStatus::OutForDelivery);
    assert!(initiated.recipient_notified);
    let sent = h.dispatcher.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].address, "recipient@example.com");
    assert!(sent[0].body.contains("100000"));

    h.clock.advance(Duration::minutes(10));
    assert_eq!(h.verify(&code, FIRST_CODE).await.unwrap(), ParcelStatus::Delivered);

    let parcel = h.service.get_parcel(&code).await.unwrap();
    assert_eq!(parcel.actual_delivery_at, Some(start() + Duration::minutes(10)));
    assert!(parcel.otp.unwrap().verified);

    let result = h.report(&code, "seal broken").await;
    assert!(matches!(result, Err(DomainError::AlreadyDelivered(_))));
    assert_eq!(h.status(&code).await, ParcelStatus::Delivered);
}

#[tokio::test]
async fn test_scanned_tamper_resolved_lost_then_scan_rejected() {
    let h = Harness::new();
    let code = h.create().await;
    assert_eq!(h.scan(&code).await.unwrap(), ParcelStatus::Scanned);

    assert_eq!(h.report(&code, "seal broken").await.unwrap(), ParcelStatus::Tampered);
    let alerts = h.tamper_workflow.list_alerts(&code).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(!alerts[0].resolved);
    assert_eq!(alerts[0].reason, "seal broken");

    assert_eq!(h.resolve(&code, "Lost").await.unwrap(), ParcelStatus::Lost);
    let alerts = h.tamper_workflow.list_alerts(&code).await.unwrap();
    assert!(alerts[0].resolved);
    assert_eq!(alerts[0].resolved_by.as_deref(), Some("admin-1"));

    let result = h.scan(&code).await;
    assert!(matches!(
        result,
        Err(DomainError::InvalidTransition {
            from: ParcelStatus::Lost,
            to: ParcelStatus::Scanned
        })
    ));

    let subjects: Vec<String> = h.dispatcher.sent().into_iter().map(|m| m.subject).collect();
    assert_eq!(
        subjects,
        vec![
            format!("ALERT: Package Tampering Detected - {}", code),
            format!("Update: Package Tampering Resolution - {}", code),
        ]
    );
}

#[tokio::test]
async fn test_verified_code_cannot_be_replayed() {
    let h = Harness::new();
    let code = h.create().await;
    h.service.initiate_delivery(action(&code)).await.unwrap();

    assert!(h.verify(&code, FIRST_CODE).await.is_ok());
    let history_before = h.history_len(&code).await;

    let replay = h.verify(&code, FIRST_CODE).await;
    assert!(matches!(replay, Err(DomainError::AlreadyDelivered(_))));
    assert_eq!(h.history_len(&code).await, history_before);
}

#[tokio::test]
async fn test_code_expires_after_thirty_minutes() {
    let h = Harness::new();
    let code = h.create().await;
    h.service.initiate_delivery(action(&code)).await.unwrap();

    h.clock.advance(Duration::minutes(30) + Duration::seconds(1));
    let result = h.verify(&code, FIRST_CODE).await;
    assert!(matches!(result, Err(DomainError::OtpExpired(_))));
    assert_eq!(h.status(&code).await, ParcelStatus::OutForDelivery);
}

#[tokio::test]
async fn test_code_still_valid_at_exactly_thirty_minutes() {
    let h = Harness::new();
    let code = h.create().await;
    h.service.initiate_delivery(action(&code)).await.unwrap();

    h.clock.advance(Duration::minutes(30));
    assert_eq!(h.verify(&code, FIRST_CODE).await.unwrap(), ParcelStatus::Delivered);
}

#[tokio::test]
async fn test_only_latest_code_is_valid() {
    let h = Harness::new();
    let code = h.create().await;
    h.service.initiate_delivery(action(&code)).await.unwrap();

    let reissued = h
        .service
        .reissue_delivery_code(IssueOtpRequest {
            tracking_code: code.clone(),
            handled_by: Some("handler-1".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(reissued.parcel.status, ParcelStatus::OutForDelivery);

    let stale = h.verify(&code, FIRST_CODE).await;
    assert!(matches!(stale, Err(DomainError::InvalidOtpCode(_))));
    assert_eq!(h.verify(&code, FIRST_CODE + 1).await.unwrap(), ParcelStatus::Delivered);
}

#[tokio::test]
async fn test_wrong_code_is_rejected_without_mutation() {
    let h = Harness::new();
    let code = h.create().await;
    h.service.initiate_delivery(action(&code)).await.unwrap();
    let before = h.service.get_parcel(&code).await.unwrap();

    let result = h.verify(&code, 999_999).await;
    assert!(matches!(result, Err(DomainError::InvalidOtpCode(_))));
    assert_eq!(h.service.get_parcel(&code).await.unwrap(), before);
}

#[tokio::test]
async fn test_tamper_from_out_for_delivery_blocks_delivery() {
    let h = Harness::new();
    let code = h.create().await;
    h.service.initiate_delivery(action(&code)).await.unwrap();

    assert_eq!(h.report(&code, "box crushed").await.unwrap(), ParcelStatus::Tampered);

    let verify = h.verify(&code, FIRST_CODE).await;
    assert!(matches!(verify, Err(DomainError::InvalidTransition { .. })));

    let second = h.report(&code, "tape cut").await;
    assert!(matches!(second, Err(DomainError::TamperAlertAlreadyOpen(_))));
    assert_eq!(h.tamper_workflow.list_alerts(&code).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_resolve_to_unlisted_status_leaves_parcel_tampered() {
    let h = Harness::new();
    let code = h.create().await;
    h.report(&code, "seal broken").await.unwrap();
    let history_before = h.history_len(&code).await;

    for target in ["Delivered", "Scanned", "Teleported"] {
        let result = h.resolve(&code, target).await;
        assert!(
            matches!(result, Err(DomainError::InvalidResolutionTarget(_))),
            "target {} gave {:?}",
            target,
            result
        );
    }

    assert_eq!(h.status(&code).await, ParcelStatus::Tampered);
    assert_eq!(h.history_len(&code).await, history_before);
}

#[tokio::test]
async fn test_resolve_requires_tampered_parcel() {
    let h = Harness::new();
    let code = h.create().await;

    let result = h.resolve(&code, "TamperResolved").await;
    assert!(matches!(result, Err(DomainError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_cleared_parcel_reenters_normal_flow() {
    let h = Harness::new();
    let code = h.create().await;
    h.report(&code, "seal broken").await.unwrap();
    assert_eq!(
        h.resolve(&code, "TamperResolved").await.unwrap(),
        ParcelStatus::TamperResolved
    );

    assert_eq!(h.scan(&code).await.unwrap(), ParcelStatus::Scanned);
    let handed = h.service.hand_over(action(&code)).await.unwrap();
    assert_eq!(handed.status, ParcelStatus::HandedOver);

    // A new incident may be reported once the previous one is closed
    assert_eq!(h.report(&code, "water damage").await.unwrap(), ParcelStatus::Tampered);
    assert_eq!(h.tamper_workflow.list_alerts(&code).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_one_history_entry_per_accepted_operation() {
    let h = Harness::new();
    let code = h.create().await;
    assert_eq!(h.history_len(&code).await, 1);

    h.scan(&code).await.unwrap();
    assert_eq!(h.history_len(&code).await, 2);

    // Re-affirming the current status still counts
    h.scan(&code).await.unwrap();
    assert_eq!(h.history_len(&code).await, 3);

    // Rejected operations leave no trace
    assert!(h.verify(&code, FIRST_CODE).await.is_err());
    assert!(h.resolve(&code, "Lost").await.is_err());
    assert_eq!(h.history_len(&code).await, 3);

    h.service.hand_over(action(&code)).await.unwrap();
    h.service.initiate_delivery(action(&code)).await.unwrap();
    h.verify(&code, FIRST_CODE).await.unwrap();

    let history = h.ledger.history(&code).await.unwrap();
    let statuses: Vec<ParcelStatus> = history.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            ParcelStatus::Created,
            ParcelStatus::Scanned,
            ParcelStatus::Scanned,
            ParcelStatus::HandedOver,
            ParcelStatus::OutForDelivery,
            ParcelStatus::Delivered,
        ]
    );
    assert!(history.windows(2).all(|pair| pair[0].id < pair[1].id));
    assert_eq!(history[0].notes.as_deref(), Some("Parcel created"));
    assert_eq!(history[0].handled_by.as_deref(), Some("sender-1"));
}

#[tokio::test]
async fn test_terminal_parcel_rejects_every_mutation() {
    let h = Harness::new();
    let code = h.create().await;
    h.report(&code, "seal broken").await.unwrap();
    h.resolve(&code, "ReturnedDueToDamage").await.unwrap();
    let before = h.service.get_parcel(&code).await.unwrap();
    let history_before = h.history_len(&code).await;

    assert!(h.scan(&code).await.is_err());
    assert!(h.service.hand_over(action(&code)).await.is_err());
    assert!(h.service.initiate_delivery(action(&code)).await.is_err());
    assert!(h.verify(&code, FIRST_CODE).await.is_err());
    assert!(h.report(&code, "again").await.is_err());
    assert!(
        h.service
            .update_status(UpdateStatusRequest {
                tracking_code: code.clone(),
                status: "InWarehouse".to_string(),
                actual_pickup_at: None,
                actual_delivery_at: None,
                location: None,
                notes: None,
                handled_by: None,
            })
            .await
            .is_err()
    );

    assert_eq!(h.service.get_parcel(&code).await.unwrap(), before);
    assert_eq!(h.history_len(&code).await, history_before);
    // Reads still work
    assert_eq!(
        h.service.track(&code).await.unwrap().status,
        ParcelStatus::ReturnedDueToDamage
    );
}

#[tokio::test]
async fn test_stale_write_is_a_concurrent_modification() {
    let h = Harness::new();
    let code = h.create().await;
    let loaded = h.service.get_parcel(&code).await.unwrap();

    // Another request moves the parcel on first
    h.scan(&code).await.unwrap();

    let mut next = loaded.clone();
    next.status = ParcelStatus::InWarehouse;
    let result = h
        .ledger
        .record(ParcelChange {
            loaded_version: loaded.version,
            parcel: next,
            location: None,
            notes: Some("stale".to_string()),
            handled_by: None,
            tamper: None,
        })
        .await;

    assert!(matches!(result, Err(DomainError::ConcurrentModification(_))));
    assert!(result.is_err_and(|e| e.is_retryable()));
    assert_eq!(h.status(&code).await, ParcelStatus::Scanned);
    assert_eq!(h.history_len(&code).await, 2);
}

#[tokio::test]
async fn test_failed_notification_does_not_roll_back() {
    let h = Harness::with_dispatcher(RecordingNotificationDispatcher::failing());
    let code = h.create().await;

    let outcome = h.service.initiate_delivery(action(&code)).await.unwrap();
    assert!(!outcome.recipient_notified);
    assert_eq!(h.status(&code).await, ParcelStatus::OutForDelivery);
    assert_eq!(h.dispatcher.sent().len(), 1);
}

#[tokio::test]
async fn test_same_millisecond_creates_get_distinct_codes() {
    let h = Harness::new();
    let first = h.create().await;
    let second = h.create().await;

    assert_eq!(first, "PCL-20250101000000000");
    assert_eq!(second, "PCL-20250101000000000-1");
    assert_eq!(
        h.service
            .list_parcels(ListParcelsFilter::BySender("sender-1".to_string()))
            .await
            .unwrap()
            .len(),
        2
    );
    assert_eq!(h.repo.all_history().len(), 2);
}

#[tokio::test]
async fn test_manual_delivery_stamps_delivery_time() {
    let h = Harness::new();
    let code = h.create().await;
    h.clock.advance(Duration::hours(3));

    let parcel = h
        .service
        .update_status(UpdateStatusRequest {
            tracking_code: code.clone(),
            status: "Out for Delivery".to_string(),
            actual_pickup_at: Some(start() + Duration::hours(1)),
            actual_delivery_at: None,
            location: None,
            notes: None,
            handled_by: Some("handler-1".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(parcel.status, ParcelStatus::OutForDelivery);
    assert_eq!(parcel.actual_pickup_at, Some(start() + Duration::hours(1)));
    assert_eq!(parcel.actual_delivery_at, None);

    let parcel = h
        .service
        .update_status(UpdateStatusRequest {
            tracking_code: code,
            status: "delivered".to_string(),
            actual_pickup_at: None,
            actual_delivery_at: None,
            location: None,
            notes: None,
            handled_by: Some("handler-1".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(parcel.status, ParcelStatus::Delivered);
    assert_eq!(parcel.actual_delivery_at, Some(start() + Duration::hours(3)));
}

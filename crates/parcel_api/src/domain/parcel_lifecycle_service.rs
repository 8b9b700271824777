use crate::domain::{
    CalculateCostRequest, IssueOtpRequest, LifecycleAction, OtpVerifier, ParcelChange, ParcelLedger,
    PricingService, ReportTamperingRequest, ResolveTamperingRequest, TamperOutcome,
    TamperWorkflow, VerifyOtpRequest, check_manual_update, check_transition,
};
use chrono::{DateTime, Utc};
use common::domain::{
    CreateParcelRepoInput, DomainError, DomainResult, ListParcelsFilter, NewHistoryEntry,
    NotificationMessage, Parcel, ParcelHistoryEntry, ParcelStatus,
};
use common::garde::parcel_weight;
use garde::Validate;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const TRACKING_CODE_PREFIX: &str = "PCL-";

/// Inserts attempted before giving up on a free tracking code
const MAX_TRACKING_CODE_ATTEMPTS: u32 = 5;

// ============================================================================
// Service Request Types
// ============================================================================

#[derive(Debug, Clone, Validate)]
pub struct CreateParcelRequest {
    #[garde(length(min = 1))]
    pub sender_id: String,
    #[garde(email)]
    pub sender_email: String,
    #[garde(email)]
    pub recipient_email: String,
    #[garde(skip)]
    pub description: Option<String>,
    #[garde(custom(parcel_weight))]
    pub weight_kg: Decimal,
    #[garde(length(min = 1))]
    pub pickup_location: String,
    #[garde(length(min = 1))]
    pub delivery_location: String,
    #[garde(skip)]
    pub expected_pickup_at: DateTime<Utc>,
    #[garde(skip)]
    pub expected_delivery_at: DateTime<Utc>,
    #[garde(skip)]
    pub pricing_tier_id: Option<i32>,
}

/// Scan, hand-over and delivery initiation all take the same shape
#[derive(Debug, Clone, Validate)]
pub struct HandlerActionRequest {
    #[garde(length(min = 1))]
    pub tracking_code: String,
    #[garde(skip)]
    pub location: Option<String>,
    #[garde(skip)]
    pub notes: Option<String>,
    #[garde(skip)]
    pub handled_by: Option<String>,
}

#[derive(Debug, Clone, Validate)]
pub struct UpdateStatusRequest {
    #[garde(length(min = 1))]
    pub tracking_code: String,
    /// Raw status text, parsed leniently against the closed status set
    #[garde(length(min = 1))]
    pub status: String,
    #[garde(skip)]
    pub actual_pickup_at: Option<DateTime<Utc>>,
    #[garde(skip)]
    pub actual_delivery_at: Option<DateTime<Utc>>,
    #[garde(skip)]
    pub location: Option<String>,
    #[garde(skip)]
    pub notes: Option<String>,
    #[garde(skip)]
    pub handled_by: Option<String>,
}

#[derive(Debug, Clone, Validate)]
pub struct HistoryRequest {
    #[garde(length(min = 1))]
    pub tracking_code: String,
    /// When set, the parcel must belong to this sender
    #[garde(skip)]
    pub owner_id: Option<String>,
}

/// Public tracking projection
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelTracking {
    pub tracking_code: String,
    pub status: ParcelStatus,
    pub delivery_location: String,
    pub expected_pickup_at: DateTime<Utc>,
    pub expected_delivery_at: DateTime<Utc>,
    pub actual_pickup_at: Option<DateTime<Utc>>,
    pub actual_delivery_at: Option<DateTime<Utc>>,
}

impl From<&Parcel> for ParcelTracking {
    fn from(parcel: &Parcel) -> Self {
        ParcelTracking {
            tracking_code: parcel.tracking_code.clone(),
            status: parcel.status,
            delivery_location: parcel.delivery_location.clone(),
            expected_pickup_at: parcel.expected_pickup_at,
            expected_delivery_at: parcel.expected_delivery_at,
            actual_pickup_at: parcel.actual_pickup_at,
            actual_delivery_at: parcel.actual_delivery_at,
        }
    }
}

/// Result of putting a parcel out for delivery
#[derive(Debug, Clone)]
pub struct DeliveryInitiated {
    pub parcel: Parcel,
    /// Whether the delivery code reached the recipient. The status change
    /// stands either way.
    pub recipient_notified: bool,
}

/// `PCL-` followed by the UTC time down to the millisecond; retries get a `-N` suffix
pub fn tracking_code(at: DateTime<Utc>, attempt: u32) -> String {
    let base = format!("{}{}", TRACKING_CODE_PREFIX, at.format("%Y%m%d%H%M%S%3f"));
    if attempt == 0 {
        base
    } else {
        format!("{}-{}", base, attempt)
    }
}

/// Top-level parcel state machine
pub struct ParcelLifecycleService {
    ledger: Arc<ParcelLedger>,
    otp_verifier: Arc<OtpVerifier>,
    tamper_workflow: Arc<TamperWorkflow>,
    pricing_service: Arc<PricingService>,
}

impl ParcelLifecycleService {
    pub fn new(
        ledger: Arc<ParcelLedger>,
        otp_verifier: Arc<OtpVerifier>,
        tamper_workflow: Arc<TamperWorkflow>,
        pricing_service: Arc<PricingService>,
    ) -> Self {
        Self {
            ledger,
            otp_verifier,
            tamper_workflow,
            pricing_service,
        }
    }

    /// Register a new parcel in `Created` with a freshly allocated tracking code
    #[instrument(skip(self, request), fields(sender_id = %request.sender_id))]
    pub async fn create_parcel(&self, request: CreateParcelRequest) -> DomainResult<Parcel> {
        common::garde::validate_struct(&request)?;

        if request.expected_delivery_at <= request.expected_pickup_at {
            return Err(DomainError::ValidationError(
                "expected_delivery_at: must be after expected_pickup_at".to_string(),
            ));
        }

        let shipping_cost = match request.pricing_tier_id {
            Some(tier_id) => Some(
                self.pricing_service
                    .calculate_cost(CalculateCostRequest {
                        weight_kg: request.weight_kg,
                        pricing_tier_id: tier_id,
                        pickup_location: Some(request.pickup_location.clone()),
                        delivery_location: Some(request.delivery_location.clone()),
                    })
                    .await?,
            ),
            None => None,
        };

        let now = self.ledger.now();
        let mut parcel = Parcel {
            id: xid::new().to_string(),
            tracking_code: String::new(),
            sender_id: request.sender_id,
            sender_email: request.sender_email,
            recipient_email: request.recipient_email,
            description: request.description,
            weight_kg: request.weight_kg,
            pickup_location: request.pickup_location,
            delivery_location: request.delivery_location,
            expected_pickup_at: request.expected_pickup_at,
            expected_delivery_at: request.expected_delivery_at,
            actual_pickup_at: None,
            actual_delivery_at: None,
            status: ParcelStatus::Created,
            otp: None,
            pricing_tier_id: request.pricing_tier_id,
            shipping_cost,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        for attempt in 0..MAX_TRACKING_CODE_ATTEMPTS {
            parcel.tracking_code = tracking_code(now, attempt);

            let input = CreateParcelRepoInput {
                parcel: parcel.clone(),
                initial_history: NewHistoryEntry {
                    tracking_code: parcel.tracking_code.clone(),
                    status: ParcelStatus::Created,
                    location: Some(parcel.pickup_location.clone()),
                    notes: Some("Parcel created".to_string()),
                    handled_by: Some(parcel.sender_id.clone()),
                    recorded_at: now,
                },
            };

            match self.ledger.create(input).await {
                Ok(created) => {
                    info!(tracking_code = %created.tracking_code, "parcel created");
                    return Ok(created);
                }
                Err(DomainError::TrackingCodeConflict(code)) => {
                    debug!(tracking_code = %code, attempt, "tracking code taken, regenerating");
                }
                Err(e) => return Err(e),
            }
        }

        warn!(tracking_code = %parcel.tracking_code, "tracking code attempts exhausted");
        Err(DomainError::TrackingCodeConflict(parcel.tracking_code))
    }

    #[instrument(skip(self, request), fields(tracking_code = %request.tracking_code))]
    pub async fn scan(&self, request: HandlerActionRequest) -> DomainResult<Parcel> {
        self.apply_simple(LifecycleAction::Scan, request, "Parcel scanned")
            .await
    }

    #[instrument(skip(self, request), fields(tracking_code = %request.tracking_code))]
    pub async fn hand_over(&self, request: HandlerActionRequest) -> DomainResult<Parcel> {
        self.apply_simple(LifecycleAction::HandOver, request, "Parcel handed over")
            .await
    }

    /// Move the parcel out for delivery with a fresh code and send the code to the recipient
    #[instrument(skip(self, request), fields(tracking_code = %request.tracking_code))]
    pub async fn initiate_delivery(
        &self,
        request: HandlerActionRequest,
    ) -> DomainResult<DeliveryInitiated> {
        common::garde::validate_struct(&request)?;

        let parcel = self.ledger.load(&request.tracking_code).await?;
        if parcel.status == ParcelStatus::Delivered {
            return Err(DomainError::AlreadyDelivered(parcel.tracking_code));
        }
        let target = check_transition(LifecycleAction::InitiateDelivery, parcel.status)?;

        let otp = self.otp_verifier.generate(self.ledger.now());
        let code = otp.code.clone();
        let expires_at = otp.expires_at();

        let mut next = parcel.clone();
        next.status = target;
        next.otp = Some(otp);

        let parcel = self
            .ledger
            .record(ParcelChange {
                loaded_version: parcel.version,
                parcel: next,
                location: request.location,
                notes: Some(
                    request
                        .notes
                        .unwrap_or_else(|| "Out for delivery; delivery code issued".to_string()),
                ),
                handled_by: request.handled_by,
                tamper: None,
            })
            .await?;

        info!(tracking_code = %parcel.tracking_code, "parcel out for delivery");

        let recipient_notified = self.send_delivery_code(&parcel, &code, expires_at).await;

        Ok(DeliveryInitiated {
            parcel,
            recipient_notified,
        })
    }

    /// Replace the code of a parcel already out for delivery and resend it
    #[instrument(skip(self, request), fields(tracking_code = %request.tracking_code))]
    pub async fn reissue_delivery_code(
        &self,
        request: IssueOtpRequest,
    ) -> DomainResult<DeliveryInitiated> {
        let issued = self.otp_verifier.issue(request).await?;
        let recipient_notified = self
            .send_delivery_code(&issued.parcel, &issued.code, issued.expires_at)
            .await;

        Ok(DeliveryInitiated {
            parcel: issued.parcel,
            recipient_notified,
        })
    }

    /// Confirm hand-off to the recipient with their delivery code
    pub async fn verify_delivery(&self, request: VerifyOtpRequest) -> DomainResult<Parcel> {
        self.otp_verifier.verify(request).await
    }

    /// Handler override of the status, outside the scripted actions
    #[instrument(skip(self, request), fields(tracking_code = %request.tracking_code, status = %request.status))]
    pub async fn update_status(&self, request: UpdateStatusRequest) -> DomainResult<Parcel> {
        common::garde::validate_struct(&request)?;

        let requested = ParcelStatus::from_str(&request.status)?;
        if requested != ParcelStatus::Delivered && request.actual_delivery_at.is_some() {
            return Err(DomainError::ValidationError(
                "actual_delivery_at: only allowed when setting Delivered".to_string(),
            ));
        }

        let parcel = self.ledger.load(&request.tracking_code).await?;
        check_manual_update(parcel.status, requested)?;

        let mut next = parcel.clone();
        next.status = requested;
        if let Some(pickup) = request.actual_pickup_at {
            next.actual_pickup_at = Some(pickup);
        }
        if requested == ParcelStatus::Delivered {
            next.actual_delivery_at = Some(request.actual_delivery_at.unwrap_or(self.ledger.now()));
        }
        if let (Some(pickup), Some(delivery)) = (next.actual_pickup_at, next.actual_delivery_at) {
            if delivery < pickup {
                return Err(DomainError::ValidationError(
                    "actual_delivery_at: must not be before actual_pickup_at".to_string(),
                ));
            }
        }

        let notes = request
            .notes
            .unwrap_or_else(|| format!("Status updated to {}", requested));

        let parcel = self
            .ledger
            .record(ParcelChange {
                loaded_version: parcel.version,
                parcel: next,
                location: request.location,
                notes: Some(notes),
                handled_by: request.handled_by,
                tamper: None,
            })
            .await?;

        info!(tracking_code = %parcel.tracking_code, status = %parcel.status, "parcel status updated");
        Ok(parcel)
    }

    pub async fn report_tampering(
        &self,
        request: ReportTamperingRequest,
    ) -> DomainResult<TamperOutcome> {
        self.tamper_workflow.report(request).await
    }

    pub async fn resolve_tampering(
        &self,
        request: ResolveTamperingRequest,
    ) -> DomainResult<TamperOutcome> {
        self.tamper_workflow.resolve(request).await
    }

    #[instrument(skip(self))]
    pub async fn track(&self, tracking_code: &str) -> DomainResult<ParcelTracking> {
        let parcel = self.ledger.load(tracking_code).await?;
        Ok(ParcelTracking::from(&parcel))
    }

    #[instrument(skip(self))]
    pub async fn get_parcel(&self, tracking_code: &str) -> DomainResult<Parcel> {
        self.ledger.load(tracking_code).await
    }

    #[instrument(skip(self))]
    pub async fn list_parcels(&self, filter: ListParcelsFilter) -> DomainResult<Vec<Parcel>> {
        let parcels = self.ledger.list(filter).await?;
        debug!(count = parcels.len(), "listed parcels");
        Ok(parcels)
    }

    /// History entries oldest first
    #[instrument(skip(self, request), fields(tracking_code = %request.tracking_code))]
    pub async fn history(&self, request: HistoryRequest) -> DomainResult<Vec<ParcelHistoryEntry>> {
        common::garde::validate_struct(&request)?;

        let parcel = self.ledger.load(&request.tracking_code).await?;
        if let Some(owner_id) = &request.owner_id {
            if parcel.sender_id != *owner_id {
                return Err(DomainError::PermissionDenied(format!(
                    "parcel {} belongs to another sender",
                    parcel.tracking_code
                )));
            }
        }

        self.ledger.history(&parcel.tracking_code).await
    }

    async fn send_delivery_code(
        &self,
        parcel: &Parcel,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> bool {
        self.ledger
            .notify(NotificationMessage {
                address: parcel.recipient_email.clone(),
                subject: format!("Your delivery code for parcel {}", parcel.tracking_code),
                body: format!(
                    "Your parcel {} is out for delivery. Give the courier this code to receive it: {}. The code expires at {}.",
                    parcel.tracking_code,
                    code,
                    expires_at.format("%Y-%m-%d %H:%M UTC")
                ),
            })
            .await
    }

    async fn apply_simple(
        &self,
        action: LifecycleAction,
        request: HandlerActionRequest,
        default_note: &str,
    ) -> DomainResult<Parcel> {
        common::garde::validate_struct(&request)?;

        let parcel = self.ledger.load(&request.tracking_code).await?;
        let target = check_transition(action, parcel.status)?;

        let mut next = parcel.clone();
        next.status = target;

        let parcel = self
            .ledger
            .record(ParcelChange {
                loaded_version: parcel.version,
                parcel: next,
                location: request.location,
                notes: Some(request.notes.unwrap_or_else(|| default_note.to_string())),
                handled_by: request.handled_by,
                tamper: None,
            })
            .await?;

        info!(tracking_code = %parcel.tracking_code, status = %parcel.status, "parcel transitioned");
        Ok(parcel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OperationTimeouts;
    use crate::domain::test_support::{base_time, parcel};
    use chrono::{Duration, TimeZone};
    use common::domain::{
        MockClock, MockNotificationDispatcher, MockOtpCodeSource, MockParcelRepository,
        MockPricingTierRepository, PricingTier,
    };
    use rust_decimal_macros::dec;

    struct Mocks {
        repo: MockParcelRepository,
        pricing: MockPricingTierRepository,
        dispatcher: MockNotificationDispatcher,
        now: DateTime<Utc>,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                repo: MockParcelRepository::new(),
                pricing: MockPricingTierRepository::new(),
                dispatcher: MockNotificationDispatcher::new(),
                now: base_time(),
            }
        }

        fn build(self) -> ParcelLifecycleService {
            let mut clock = MockClock::new();
            clock.expect_now().return_const(self.now);
            let mut codes = MockOtpCodeSource::new();
            codes.expect_next_code().return_const(654_321u32);

            let timeouts = OperationTimeouts::default();
            let ledger = Arc::new(ParcelLedger::new(
                Arc::new(self.repo),
                Arc::new(self.dispatcher),
                Arc::new(clock),
                timeouts,
            ));
            ParcelLifecycleService::new(
                ledger.clone(),
                Arc::new(OtpVerifier::new(ledger.clone(), Arc::new(codes))),
                Arc::new(TamperWorkflow::new(ledger)),
                Arc::new(PricingService::new(Arc::new(self.pricing), timeouts.repository)),
            )
        }
    }

    fn create_request() -> CreateParcelRequest {
        CreateParcelRequest {
            sender_id: "sender-1".to_string(),
            sender_email: "sender@example.com".to_string(),
            recipient_email: "recipient@example.com".to_string(),
            description: Some("Books".to_string()),
            weight_kg: dec!(2),
            pickup_location: "Depot A".to_string(),
            delivery_location: "12 Harbour Road".to_string(),
            expected_pickup_at: base_time(),
            expected_delivery_at: base_time() + Duration::days(2),
            pricing_tier_id: None,
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

    #[test]
    fn test_tracking_code_format() {
        let at = Utc.with_ymd_and_hms(2025, 6, 4, 8, 47, 51).unwrap() + Duration::milliseconds(7);
        assert_eq!(tracking_code(at, 0), "PCL-20250604084751007");
        assert_eq!(tracking_code(at, 2), "PCL-20250604084751007-2");
    }

    #[tokio::test]
    async fn test_create_parcel_success() {
        let mut mocks = Mocks::new();
        mocks
            .repo
            .expect_create_parcel()
            .withf(|input| {
                input.parcel.status == ParcelStatus::Created
                    && input.parcel.tracking_code == "PCL-20250101000000000"
                    && input.initial_history.status == ParcelStatus::Created
                    && input.parcel.shipping_cost.is_none()
            })
            .times(1)
            .returning(|input| Ok(input.parcel));

        let parcel = mocks.build().create_parcel(create_request()).await.unwrap();
        assert_eq!(parcel.status, ParcelStatus::Created);
        assert!(!parcel.id.is_empty());
    }

    #[tokio::test]
    async fn test_create_parcel_retries_tracking_code_conflict() {
        let mut mocks = Mocks::new();
        let mut seq = mockall::Sequence::new();
        mocks
            .repo
            .expect_create_parcel()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|input| Err(DomainError::TrackingCodeConflict(input.parcel.tracking_code)));
        mocks
            .repo
            .expect_create_parcel()
            .withf(|input| input.parcel.tracking_code == "PCL-20250101000000000-1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|input| Ok(input.parcel));

        let parcel = mocks.build().create_parcel(create_request()).await.unwrap();
        assert_eq!(parcel.tracking_code, "PCL-20250101000000000-1");
    }

    #[tokio::test]
    async fn test_create_parcel_rejects_unstorable_weight() {
        // No repository expectations: nothing may be priced or written
        let service = Mocks::new().build();

        for weight in [dec!(1000000000), dec!(1.2345), Decimal::MAX] {
            let mut request = create_request();
            request.weight_kg = weight;
            request.pricing_tier_id = Some(1);

            let result = service.create_parcel(request).await;
            assert!(
                matches!(result, Err(DomainError::ValidationError(ref msg)) if msg.contains("weight_kg")),
                "weight {} gave {:?}",
                weight,
                result
            );
        }
    }

    #[tokio::test]
    async fn test_create_parcel_gives_up_after_bounded_attempts() {
        let mut mocks = Mocks::new();
        mocks
            .repo
            .expect_create_parcel()
            .times(MAX_TRACKING_CODE_ATTEMPTS as usize)
            .returning(|input| Err(DomainError::TrackingCodeConflict(input.parcel.tracking_code)));

        let result = mocks.build().create_parcel(create_request()).await;
        assert!(matches!(result, Err(DomainError::TrackingCodeConflict(_))));
    }

    #[tokio::test]
    async fn test_create_parcel_prices_shipment() {
        let mut mocks = Mocks::new();
        mocks.pricing.expect_get_tier().returning(|id| {
            Ok(Some(PricingTier {
                id,
                name: "Standard".to_string(),
                base_price: dec!(5),
                price_per_kg: dec!(1.25),
                estimated_delivery_days: 4,
                is_active: true,
                description: None,
            }))
        });
        mocks
            .repo
            .expect_create_parcel()
            .withf(|input| {
                input.parcel.shipping_cost == Some(dec!(7.50))
                    && input.parcel.pricing_tier_id == Some(1)
            })
            .returning(|input| Ok(input.parcel));

        let mut request = create_request();
        request.pricing_tier_id = Some(1);
        mocks.build().create_parcel(request).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_parcel_validation() {
        let mut request = create_request();
        request.expected_delivery_at = request.expected_pickup_at;
        let result = Mocks::new().build().create_parcel(request).await;
        assert!(matches!(result, Err(DomainError::ValidationError(_))));

        let mut request = create_request();
        request.recipient_email = "not-an-email".to_string();
        let result = Mocks::new().build().create_parcel(request).await;
        assert!(matches!(result, Err(DomainError::ValidationError(_))));

        let mut request = create_request();
        request.weight_kg = dec!(-1);
        let result = Mocks::new().build().create_parcel(request).await;
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_scan_from_created() {
        let mut mocks = Mocks::new();
        mocks
            .repo
            .expect_get_parcel()
            .returning(|code| Ok(Some(parcel(code, ParcelStatus::Created))));
        mocks
            .repo
            .expect_commit()
            .withf(|commit| {
                commit.parcel.status == ParcelStatus::Scanned
                    && commit.history.notes.as_deref() == Some("Parcel scanned")
                    && commit.history.handled_by.as_deref() == Some("handler-1")
            })
            .times(1)
            .returning(|commit| Ok(commit.parcel));

        let parcel = mocks.build().scan(action("PCL-1")).await.unwrap();
        assert_eq!(parcel.status, ParcelStatus::Scanned);
    }

    #[tokio::test]
    async fn test_handover_from_created_is_invalid() {
        let mut mocks = Mocks::new();
        mocks
            .repo
            .expect_get_parcel()
            .returning(|code| Ok(Some(parcel(code, ParcelStatus::Created))));
        mocks.repo.expect_commit().never();

        let result = mocks.build().hand_over(action("PCL-1")).await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidTransition {
                from: ParcelStatus::Created,
                to: ParcelStatus::HandedOver
            })
        ));
    }

    #[tokio::test]
    async fn test_initiate_delivery_issues_code_and_notifies_recipient() {
        let mut mocks = Mocks::new();
        mocks
            .repo
            .expect_get_parcel()
            .returning(|code| Ok(Some(parcel(code, ParcelStatus::HandedOver))));
        mocks
            .repo
            .expect_commit()
            .withf(|commit| {
                commit.parcel.status == ParcelStatus::OutForDelivery
                    && commit.parcel.otp.as_ref().map(|o| o.code.as_str()) == Some("654321")
            })
            .times(1)
            .returning(|commit| Ok(commit.parcel));
        mocks
            .dispatcher
            .expect_send()
            .withf(|message| {
                message.address == "recipient@example.com" && message.body.contains("654321")
            })
            .times(1)
            .returning(|_| Ok(()));

        let outcome = mocks.build().initiate_delivery(action("PCL-1")).await.unwrap();
        assert_eq!(outcome.parcel.status, ParcelStatus::OutForDelivery);
        assert!(outcome.recipient_notified);
    }

    #[tokio::test]
    async fn test_initiate_delivery_keeps_status_when_notification_fails() {
        let mut mocks = Mocks::new();
        mocks
            .repo
            .expect_get_parcel()
            .returning(|code| Ok(Some(parcel(code, ParcelStatus::Scanned))));
        mocks
            .repo
            .expect_commit()
            .returning(|commit| Ok(commit.parcel));
        mocks
            .dispatcher
            .expect_send()
            .returning(|_| Err(DomainError::TransportError("relay down".to_string())));

        let outcome = mocks.build().initiate_delivery(action("PCL-1")).await.unwrap();
        assert_eq!(outcome.parcel.status, ParcelStatus::OutForDelivery);
        assert!(!outcome.recipient_notified);
    }

    #[tokio::test]
    async fn test_initiate_delivery_on_delivered_parcel() {
        let mut mocks = Mocks::new();
        mocks
            .repo
            .expect_get_parcel()
            .returning(|code| Ok(Some(parcel(code, ParcelStatus::Delivered))));

        let result = mocks.build().initiate_delivery(action("PCL-1")).await;
        assert!(matches!(result, Err(DomainError::AlreadyDelivered(_))));
    }

    #[tokio::test]
    async fn test_reissue_delivery_code_resends_to_recipient() {
        let mut mocks = Mocks::new();
        mocks
            .repo
            .expect_get_parcel()
            .returning(|code| Ok(Some(parcel(code, ParcelStatus::OutForDelivery))));
        mocks
            .repo
            .expect_commit()
            .withf(|commit| {
                commit.parcel.status == ParcelStatus::OutForDelivery
                    && commit.parcel.otp.as_ref().map(|o| o.code.as_str()) == Some("654321")
            })
            .times(1)
            .returning(|commit| Ok(commit.parcel));
        mocks
            .dispatcher
            .expect_send()
            .withf(|message| message.body.contains("654321"))
            .times(1)
            .returning(|_| Ok(()));

        let outcome = mocks
            .build()
            .reissue_delivery_code(IssueOtpRequest {
                tracking_code: "PCL-1".to_string(),
                handled_by: Some("handler-1".to_string()),
            })
            .await
            .unwrap();
        assert!(outcome.recipient_notified);
    }

    #[tokio::test]
    async fn test_concurrent_modification_propagates() {
        let mut mocks = Mocks::new();
        mocks
            .repo
            .expect_get_parcel()
            .returning(|code| Ok(Some(parcel(code, ParcelStatus::Scanned))));
        mocks
            .repo
            .expect_commit()
            .returning(|commit| Err(DomainError::ConcurrentModification(commit.parcel.tracking_code)));

        let result = mocks.build().hand_over(action("PCL-1")).await;
        assert!(matches!(result, Err(DomainError::ConcurrentModification(_))));
    }

    #[tokio::test]
    async fn test_update_status_to_delivered_stamps_delivery() {
        let mut mocks = Mocks::new();
        let now = mocks.now;
        mocks
            .repo
            .expect_get_parcel()
            .returning(|code| Ok(Some(parcel(code, ParcelStatus::OutForDelivery))));
        mocks
            .repo
            .expect_commit()
            .withf(move |commit| {
                commit.parcel.status == ParcelStatus::Delivered
                    && commit.parcel.actual_delivery_at == Some(now)
            })
            .returning(|commit| Ok(commit.parcel));

        let parcel = mocks
            .build()
            .update_status(UpdateStatusRequest {
                tracking_code: "PCL-1".to_string(),
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
    }

    #[tokio::test]
    async fn test_update_status_rejects_unknown_status() {
        let result = Mocks::new()
            .build()
            .update_status(UpdateStatusRequest {
                tracking_code: "PCL-1".to_string(),
                status: "Teleported".to_string(),
                actual_pickup_at: None,
                actual_delivery_at: None,
                location: None,
                notes: None,
                handled_by: None,
            })
            .await;
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_update_status_rejects_delivery_before_pickup() {
        let mut mocks = Mocks::new();
        mocks
            .repo
            .expect_get_parcel()
            .returning(|code| Ok(Some(parcel(code, ParcelStatus::OutForDelivery))));
        mocks.repo.expect_commit().never();

        let result = mocks
            .build()
            .update_status(UpdateStatusRequest {
                tracking_code: "PCL-1".to_string(),
                status: "Delivered".to_string(),
                actual_pickup_at: Some(base_time() + Duration::hours(5)),
                actual_delivery_at: Some(base_time() + Duration::hours(1)),
                location: None,
                notes: None,
                handled_by: None,
            })
            .await;
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_update_status_cannot_leave_tampered() {
        let mut mocks = Mocks::new();
        mocks
            .repo
            .expect_get_parcel()
            .returning(|code| Ok(Some(parcel(code, ParcelStatus::Tampered))));
        mocks.repo.expect_commit().never();

        let result = mocks
            .build()
            .update_status(UpdateStatusRequest {
                tracking_code: "PCL-1".to_string(),
                status: "OutForDelivery".to_string(),
                actual_pickup_at: None,
                actual_delivery_at: None,
                location: None,
                notes: None,
                handled_by: None,
            })
            .await;
        assert!(matches!(result, Err(DomainError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_track_projection() {
        let mut mocks = Mocks::new();
        mocks
            .repo
            .expect_get_parcel()
            .returning(|code| Ok(Some(parcel(code, ParcelStatus::InWarehouse))));

        let tracking = mocks.build().track("PCL-1").await.unwrap();
        assert_eq!(tracking.status, ParcelStatus::InWarehouse);
        assert_eq!(tracking.delivery_location, "12 Harbour Road");
    }

    #[tokio::test]
    async fn test_history_checks_owner() {
        let mut mocks = Mocks::new();
        mocks
            .repo
            .expect_get_parcel()
            .returning(|code| Ok(Some(parcel(code, ParcelStatus::Scanned))));
        mocks.repo.expect_list_history().never();

        let result = mocks
            .build()
            .history(HistoryRequest {
                tracking_code: "PCL-1".to_string(),
                owner_id: Some("sender-2".to_string()),
            })
            .await;
        assert!(matches!(result, Err(DomainError::PermissionDenied(_))));
    }
}

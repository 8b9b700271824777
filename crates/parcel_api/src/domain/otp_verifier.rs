use crate::domain::{ParcelChange, ParcelLedger};
use chrono::{DateTime, Utc};
use common::domain::{
    DeliveryOtp, DomainError, DomainResult, OtpCodeSource, Parcel, ParcelStatus,
};
use garde::Validate;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Request to replace the delivery code of a parcel already out for delivery
#[derive(Debug, Clone, Validate)]
pub struct IssueOtpRequest {
    #[garde(length(min = 1))]
    pub tracking_code: String,
    #[garde(skip)]
    pub handled_by: Option<String>,
}

/// Request to confirm hand-off with the code the recipient presents
#[derive(Debug, Clone, Validate)]
pub struct VerifyOtpRequest {
    #[garde(length(min = 1))]
    pub tracking_code: String,
    #[garde(length(min = 1))]
    pub code: String,
    #[garde(skip)]
    pub location: Option<String>,
    #[garde(skip)]
    pub handled_by: Option<String>,
}

/// A freshly stored code, returned to the caller for dispatch
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub parcel: Parcel,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Generates, stores and checks delivery codes
pub struct OtpVerifier {
    ledger: Arc<ParcelLedger>,
    code_source: Arc<dyn OtpCodeSource>,
}

impl OtpVerifier {
    pub fn new(ledger: Arc<ParcelLedger>, code_source: Arc<dyn OtpCodeSource>) -> Self {
        Self {
            ledger,
            code_source,
        }
    }

    /// Draw a new unverified code valid from `at`
    pub fn generate(&self, at: DateTime<Utc>) -> DeliveryOtp {
        DeliveryOtp::new(self.code_source.next_code(), at)
    }

    /// Replace the stored code. Only the latest code is ever valid.
    #[instrument(skip(self, request), fields(tracking_code = %request.tracking_code))]
    pub async fn issue(&self, request: IssueOtpRequest) -> DomainResult<IssuedOtp> {
        common::garde::validate_struct(&request)?;

        let parcel = self.ledger.load(&request.tracking_code).await?;
        if parcel.status == ParcelStatus::Delivered {
            return Err(DomainError::AlreadyDelivered(parcel.tracking_code));
        }
        if parcel.status != ParcelStatus::OutForDelivery {
            return Err(DomainError::InvalidTransition {
                from: parcel.status,
                to: ParcelStatus::OutForDelivery,
            });
        }

        let otp = self.generate(self.ledger.now());
        let code = otp.code.clone();
        let expires_at = otp.expires_at();

        let mut next = parcel.clone();
        next.otp = Some(otp);

        let parcel = self
            .ledger
            .record(ParcelChange {
                loaded_version: parcel.version,
                parcel: next,
                location: None,
                notes: Some("Delivery code reissued".to_string()),
                handled_by: request.handled_by,
                tamper: None,
            })
            .await?;

        info!(tracking_code = %parcel.tracking_code, "delivery code issued");

        Ok(IssuedOtp {
            parcel,
            code,
            expires_at,
        })
    }

    /// Check the supplied code and, on success, mark the parcel delivered in
    /// the same commit that marks the code verified.
    #[instrument(skip(self, request), fields(tracking_code = %request.tracking_code))]
    pub async fn verify(&self, request: VerifyOtpRequest) -> DomainResult<Parcel> {
        common::garde::validate_struct(&request)?;

        let parcel = self.ledger.load(&request.tracking_code).await?;
        let now = self.ledger.now();

        check_code(&parcel, &request.code, now)?;

        let mut next = parcel.clone();
        next.status = ParcelStatus::Delivered;
        next.actual_delivery_at = Some(now);
        if let Some(otp) = next.otp.as_mut() {
            otp.verified = true;
        }

        let parcel = self
            .ledger
            .record(ParcelChange {
                loaded_version: parcel.version,
                parcel: next,
                location: request.location,
                notes: Some("Delivery confirmed with recipient code".to_string()),
                handled_by: request.handled_by,
                tamper: None,
            })
            .await?;

        info!(tracking_code = %parcel.tracking_code, "delivery verified");
        Ok(parcel)
    }
}

/// Ordered checks: delivered, status, code present and matching, then expiry
fn check_code(parcel: &Parcel, supplied: &str, now: DateTime<Utc>) -> DomainResult<()> {
    if parcel.status == ParcelStatus::Delivered {
        return Err(DomainError::AlreadyDelivered(parcel.tracking_code.clone()));
    }
    if parcel.status != ParcelStatus::OutForDelivery {
        return Err(DomainError::InvalidTransition {
            from: parcel.status,
            to: ParcelStatus::Delivered,
        });
    }

    let Some(otp) = parcel.otp.as_ref() else {
        debug!(tracking_code = %parcel.tracking_code, "no delivery code issued");
        return Err(DomainError::InvalidOtpCode(parcel.tracking_code.clone()));
    };
    if otp.verified {
        return Err(DomainError::AlreadyDelivered(parcel.tracking_code.clone()));
    }
    if !otp.matches(supplied) {
        warn!(tracking_code = %parcel.tracking_code, "delivery code mismatch");
        return Err(DomainError::InvalidOtpCode(parcel.tracking_code.clone()));
    }
    if otp.is_expired_at(now) {
        return Err(DomainError::OtpExpired(parcel.tracking_code.clone()));
    }
    Ok(())
}

use crate::domain::ParcelStatus;
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Parcel not found: {0}")]
    ParcelNotFound(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: ParcelStatus, to: ParcelStatus },

    #[error("Invalid delivery code for parcel {0}")]
    InvalidOtpCode(String),

    #[error("Delivery code expired for parcel {0}")]
    OtpExpired(String),

    #[error("Parcel already delivered: {0}")]
    AlreadyDelivered(String),

    #[error("Invalid tamper resolution target: {0}")]
    InvalidResolutionTarget(String),

    #[error("Parcel {0} already has an unresolved tamper alert")]
    TamperAlertAlreadyOpen(String),

    #[error("Pricing tier not found: {0}")]
    PricingTierNotFound(String),

    #[error("Tracking code already in use: {0}")]
    TrackingCodeConflict(String),

    #[error("Parcel {0} was modified concurrently")]
    ConcurrentModification(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Missing or malformed credentials: {0}")]
    Unauthenticated(String),

    #[error("Invalid or expired token: {0}")]
    InvalidToken(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

impl DomainError {
    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::ConcurrentModification(_)
                | DomainError::TransportError(_)
                | DomainError::RepositoryError(_)
        )
    }

    /// Stable machine-readable name used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::ValidationError(_) => "ValidationError",
            DomainError::ParcelNotFound(_) => "NotFound",
            DomainError::InvalidTransition { .. } => "InvalidTransition",
            DomainError::InvalidOtpCode(_) => "InvalidCode",
            DomainError::OtpExpired(_) => "Expired",
            DomainError::AlreadyDelivered(_) => "AlreadyDelivered",
            DomainError::InvalidResolutionTarget(_) => "InvalidResolutionTarget",
            DomainError::TamperAlertAlreadyOpen(_) => "TamperAlertAlreadyOpen",
            DomainError::PricingTierNotFound(_) => "NotFound",
            DomainError::TrackingCodeConflict(_) => "Conflict",
            DomainError::ConcurrentModification(_) => "ConcurrentModification",
            DomainError::TransportError(_) | DomainError::RepositoryError(_) => "TransportError",
            DomainError::Unauthenticated(_) | DomainError::InvalidToken(_) => "Unauthenticated",
            DomainError::PermissionDenied(_) => "PermissionDenied",
        }
    }
}

use crate::domain::{DomainError, DomainResult};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::error;

/// JSON body returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub retryable: bool,
}

/// Map a domain error to its HTTP status
pub fn domain_error_status(error: &DomainError) -> StatusCode {
    match error {
        DomainError::ValidationError(_)
        | DomainError::InvalidOtpCode(_)
        | DomainError::InvalidResolutionTarget(_) => StatusCode::BAD_REQUEST,

        DomainError::ParcelNotFound(_) | DomainError::PricingTierNotFound(_) => {
            StatusCode::NOT_FOUND
        }

        DomainError::InvalidTransition { .. }
        | DomainError::AlreadyDelivered(_)
        | DomainError::TamperAlertAlreadyOpen(_)
        | DomainError::ConcurrentModification(_) => StatusCode::CONFLICT,

        DomainError::OtpExpired(_) => StatusCode::GONE,

        DomainError::Unauthenticated(_) | DomainError::InvalidToken(_) => {
            StatusCode::UNAUTHORIZED
        }

        DomainError::PermissionDenied(_) => StatusCode::FORBIDDEN,

        DomainError::TransportError(_) | DomainError::RepositoryError(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }

        DomainError::TrackingCodeConflict(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert domain error to an HTTP response
pub fn domain_error_to_response(error: DomainError) -> Response {
    let status = domain_error_status(&error);

    let message = match &error {
        DomainError::RepositoryError(e) => {
            error!(error = %e, "repository failure");
            "Storage temporarily unavailable".to_string()
        }
        DomainError::TrackingCodeConflict(code) => {
            error!(tracking_code = %code, "tracking code generation exhausted");
            "Could not allocate a tracking code".to_string()
        }
        other => other.to_string(),
    };

    let body = ErrorBody {
        error: error.kind().to_string(),
        message,
        retryable: error.is_retryable(),
    };

    (status, Json(body)).into_response()
}

/// Handler error wrapper so `?` works on `DomainResult` inside axum handlers
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        domain_error_to_response(self.0)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Unwrap a JSON body, reporting malformed input as a `ValidationError`
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> DomainResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| DomainError::ValidationError(rejection.body_text()))
}

/// Parse a body that may be left out. An empty body is `None`; anything else
/// must be valid JSON for `T`.
pub fn optional_json_body<T: DeserializeOwned>(body: &[u8]) -> DomainResult<Option<T>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| DomainError::ValidationError(format!("invalid JSON body: {}", e)))
}

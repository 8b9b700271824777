use crate::auth::UserContext;
use crate::domain::DomainResult;

/// Validates bearer tokens issued by the identity service
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait AuthTokenProvider: Send + Sync {
    /// Validate an access token and extract the caller's identity and role
    fn validate_token(&self, token: &str) -> DomainResult<UserContext>;
}

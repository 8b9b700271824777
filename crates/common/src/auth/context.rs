use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::traits::AuthTokenProvider;
use crate::domain::{DomainError, DomainResult};

/// Actor roles carried in the token's `role` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Sender,
    Handler,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Sender => "Sender",
            Role::Handler => "Handler",
            Role::Admin => "Admin",
        };
        f.write_str(name)
    }
}

/// User context extracted from authenticated requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

impl UserContext {
    /// Fail with `PermissionDenied` unless the caller holds one of `allowed`
    pub fn require_role(&self, allowed: &[Role]) -> DomainResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(DomainError::PermissionDenied(format!(
                "role {} may not perform this action",
                self.role
            )))
        }
    }
}

/// Extract user context from a request's authorization header
///
/// Expects a Bearer token in the Authorization header and validates it
/// using the provided AuthTokenProvider.
pub fn extract_user_context(
    headers: &HeaderMap,
    auth_token_provider: &dyn AuthTokenProvider,
) -> DomainResult<UserContext> {
    let auth_header = headers
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| DomainError::Unauthenticated("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| DomainError::Unauthenticated("Invalid authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .ok_or_else(|| {
            DomainError::Unauthenticated(
                "Invalid authorization format, expected 'Bearer <token>'".to_string(),
            )
        })?;

    auth_token_provider.validate_token(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockAuthTokenProvider;

    fn handler() -> UserContext {
        UserContext {
            user_id: "handler-1".to_string(),
            email: "handler@example.com".to_string(),
            role: Role::Handler,
        }
    }

    #[test]
    fn test_extract_user_context_success() {
        let mut mock_provider = MockAuthTokenProvider::new();
        mock_provider
            .expect_validate_token()
            .with(mockall::predicate::eq("valid_token"))
            .returning(|_| Ok(handler()));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer valid_token".parse().unwrap());

        let context = extract_user_context(&headers, &mock_provider).unwrap();
        assert_eq!(context.user_id, "handler-1");
        assert_eq!(context.role, Role::Handler);
    }

    #[test]
    fn test_extract_user_context_missing_header() {
        let mock_provider = MockAuthTokenProvider::new();
        let headers = HeaderMap::new();

        let result = extract_user_context(&headers, &mock_provider);
        assert!(matches!(result, Err(DomainError::Unauthenticated(_))));
    }

    #[test]
    fn test_extract_user_context_invalid_format() {
        let mock_provider = MockAuthTokenProvider::new();
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic abc123".parse().unwrap());

        let result = extract_user_context(&headers, &mock_provider);
        assert!(matches!(result, Err(DomainError::Unauthenticated(_))));
    }

    #[test]
    fn test_extract_user_context_invalid_token() {
        let mut mock_provider = MockAuthTokenProvider::new();
        mock_provider
            .expect_validate_token()
            .returning(|_| Err(DomainError::InvalidToken("expired".to_string())));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "bearer stale_token".parse().unwrap());

        let result = extract_user_context(&headers, &mock_provider);
        assert!(matches!(result, Err(DomainError::InvalidToken(_))));
    }

    #[test]
    fn test_require_role() {
        let context = handler();
        assert!(context.require_role(&[Role::Handler, Role::Admin]).is_ok());
        assert!(matches!(
            context.require_role(&[Role::Sender]),
            Err(DomainError::PermissionDenied(_))
        ));
    }
}

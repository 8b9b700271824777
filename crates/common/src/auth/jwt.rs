use crate::auth::{AuthTokenProvider, JwtConfig, Role, UserContext};
use crate::domain::{DomainError, DomainResult};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String, // user_id
    pub email: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

/// HS256 implementation of AuthTokenProvider
pub struct JwtAuthTokenProvider {
    config: JwtConfig,
}

impl JwtAuthTokenProvider {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    /// Sign a token with the shared secret. Issuance normally happens in the
    /// identity service; this is used for local tooling and tests.
    pub fn issue_token(&self, user_id: &str, email: &str, role: Role) -> DomainResult<String> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::hours(self.config.expiration_hours as i64);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )
        .map_err(|e| DomainError::RepositoryError(anyhow::anyhow!("JWT encoding error: {}", e)))
    }
}

impl AuthTokenProvider for JwtAuthTokenProvider {
    fn validate_token(&self, token: &str) -> DomainResult<UserContext> {
        let mut validation = Validation::default();
        validation.leeway = self.config.leeway_secs;

        let token_data = decode::<JwtClaims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| DomainError::InvalidToken(e.to_string()))?;

        Ok(UserContext {
            user_id: token_data.claims.sub,
            email: token_data.claims.email,
            role: token_data.claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig::new("test-secret-key".to_string(), 24)
    }

    #[test]
    fn test_issue_and_validate_token() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let token = provider
            .issue_token("user-123", "sender@example.com", Role::Sender)
            .unwrap();

        let context = provider.validate_token(&token).unwrap();
        assert_eq!(context.user_id, "user-123");
        assert_eq!(context.email, "sender@example.com");
        assert_eq!(context.role, Role::Sender);
    }

    #[test]
    fn test_validate_token_invalid() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let result = provider.validate_token("invalid-token");
        assert!(matches!(result, Err(DomainError::InvalidToken(_))));
    }

    #[test]
    fn test_validate_token_wrong_secret() {
        let provider1 = JwtAuthTokenProvider::new(test_config());
        let provider2 =
            JwtAuthTokenProvider::new(JwtConfig::new("different-secret".to_string(), 24));

        let token = provider1
            .issue_token("user-123", "handler@example.com", Role::Handler)
            .unwrap();
        let result = provider2.validate_token(&token);
        assert!(matches!(result, Err(DomainError::InvalidToken(_))));
    }
}

/// Configuration for bearer token validation
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: u64,
    /// Accepted clock skew when checking `exp`, in seconds
    pub leeway_secs: u64,
}

impl JwtConfig {
    pub fn new(secret: String, expiration_hours: u64) -> Self {
        Self {
            secret,
            expiration_hours,
            leeway_secs: 60,
        }
    }
}

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

pub const OTP_MIN: u32 = 100_000;
pub const OTP_MAX: u32 = 999_999;

/// Lifetime of a delivery code, counted from generation
pub const OTP_VALIDITY_MINUTES: i64 = 30;

/// Delivery confirmation code stored on the parcel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOtp {
    pub code: String,
    pub generated_at: DateTime<Utc>,
    pub verified: bool,
}

impl DeliveryOtp {
    pub fn new(code: u32, generated_at: DateTime<Utc>) -> Self {
        Self {
            code: format!("{:06}", code),
            generated_at,
            verified: false,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.generated_at + Duration::minutes(OTP_VALIDITY_MINUTES)
    }

    /// The code is still accepted at exactly `expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    /// Constant-time comparison of the supplied code
    pub fn matches(&self, supplied: &str) -> bool {
        let expected = self.code.as_bytes();
        let supplied = supplied.trim().as_bytes();
        if expected.len() != supplied.len() {
            return false;
        }
        expected
            .iter()
            .zip(supplied)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// Source of delivery codes. Injected so generation is deterministic under test.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait OtpCodeSource: Send + Sync {
    /// Returns a code in `OTP_MIN..=OTP_MAX`
    fn next_code(&self) -> u32;
}

/// Uniform codes from the thread-local RNG
#[derive(Debug, Clone, Default)]
pub struct RandomOtpCodeSource;

impl OtpCodeSource for RandomOtpCodeSource {
    fn next_code(&self) -> u32 {
        rand::thread_rng().gen_range(OTP_MIN..=OTP_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_random_codes_stay_in_range() {
        let source = RandomOtpCodeSource;
        for _ in 0..1_000 {
            let code = source.next_code();
            assert!((OTP_MIN..=OTP_MAX).contains(&code));
        }
    }

    #[test]
    fn test_code_is_six_digits() {
        let otp = DeliveryOtp::new(123_456, generated_at());
        assert_eq!(otp.code, "123456");
        assert!(!otp.verified);
    }

    #[test]
    fn test_matches() {
        let otp = DeliveryOtp::new(654_321, generated_at());
        assert!(otp.matches("654321"));
        assert!(otp.matches(" 654321 "));
        assert!(!otp.matches("654320"));
        assert!(!otp.matches("65432"));
        assert!(!otp.matches(""));
    }

    #[test]
    fn test_expiry_window_is_thirty_minutes() {
        let otp = DeliveryOtp::new(111_111, generated_at());
        assert!(!otp.is_expired_at(generated_at() + Duration::minutes(29)));
        assert!(!otp.is_expired_at(generated_at() + Duration::minutes(30)));
        assert!(otp.is_expired_at(generated_at() + Duration::minutes(30) + Duration::seconds(1)));
    }
}

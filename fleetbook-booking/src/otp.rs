use chrono::{DateTime, Utc};
use fleetbook_core::{BookingError, OtpPurpose, OtpToken};
use fleetbook_shared::Masked;
use rand::Rng;
use subtle::ConstantTimeEq;
use uuid::Uuid;

pub const DEFAULT_OTP_LENGTH: usize = 6;
const MIN_OTP_LENGTH: usize = 4;
const MAX_OTP_LENGTH: usize = 9;

/// Issues and verifies the numeric one-time codes that gate pickup and return.
#[derive(Debug, Clone)]
pub struct OtpIssuer {
    length: usize,
}

impl OtpIssuer {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.clamp(MIN_OTP_LENGTH, MAX_OTP_LENGTH),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Generate a fresh numeric code (leading zeros allowed)
    pub fn generate(&self) -> Masked<String> {
        let mut rng = rand::thread_rng();
        let code: String = (0..self.length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        Masked(code)
    }

    /// Bind a fresh code to a booking and the transition it guards
    pub fn issue(
        &self,
        booking_id: Uuid,
        purpose: OtpPurpose,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> OtpToken {
        OtpToken {
            id: Uuid::new_v4(),
            booking_id,
            purpose,
            otp: self.generate(),
            expires_at,
            created_at: now,
        }
    }

    /// Accepts only when the token exists, is bound to `booking_id`, has not
    /// expired and carries `code`. Every failure is the same `InvalidOtp`.
    pub fn verify(
        &self,
        token: Option<&OtpToken>,
        booking_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        let Some(token) = token else {
            return Err(BookingError::InvalidOtp);
        };

        let code_matches: bool = token.otp.expose().as_bytes().ct_eq(code.trim().as_bytes()).into();
        let bound = token.booking_id == booking_id;
        let live = token.expires_at > now;

        if code_matches & bound & live {
            Ok(())
        } else {
            Err(BookingError::InvalidOtp)
        }
    }
}

impl Default for OtpIssuer {
    fn default() -> Self {
        Self::new(DEFAULT_OTP_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn issued(issuer: &OtpIssuer, booking_id: Uuid, now: DateTime<Utc>) -> OtpToken {
        issuer.issue(booking_id, OtpPurpose::Checkout, now + Duration::minutes(10), now)
    }

    #[test]
    fn test_generated_codes_are_numeric() {
        let issuer = OtpIssuer::default();
        for _ in 0..50 {
            let code = issuer.generate();
            assert_eq!(code.expose().len(), 6);
            assert!(code.expose().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_length_is_clamped() {
        assert_eq!(OtpIssuer::new(1).length(), 4);
        assert_eq!(OtpIssuer::new(32).length(), 9);
    }

    #[test]
    fn test_verify_accepts_matching_code() {
        let issuer = OtpIssuer::default();
        let now = Utc::now();
        let booking_id = Uuid::new_v4();
        let token = issued(&issuer, booking_id, now);
        let code = token.otp.expose().clone();

        assert!(issuer.verify(Some(&token), booking_id, &code, now).is_ok());
    }

    #[test]
    fn test_verify_failures_are_indistinguishable() {
        let issuer = OtpIssuer::default();
        let now = Utc::now();
        let booking_id = Uuid::new_v4();
        let token = issued(&issuer, booking_id, now);
        let code = token.otp.expose().clone();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let failures = [
            issuer.verify(None, booking_id, &code, now),
            issuer.verify(Some(&token), booking_id, wrong, now),
            issuer.verify(Some(&token), Uuid::new_v4(), &code, now),
            issuer.verify(Some(&token), booking_id, &code, now + Duration::minutes(10)),
            issuer.verify(Some(&token), booking_id, "", now),
        ];

        for result in failures {
            assert!(matches!(result, Err(BookingError::InvalidOtp)));
        }
    }
}

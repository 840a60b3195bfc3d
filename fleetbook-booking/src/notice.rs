use chrono::{DateTime, Utc};
use fleetbook_core::{OtpPurpose, OtpToken};

/// Rendered e-mail carrying a one-time code to the seeker.
#[derive(Debug, Clone)]
pub struct OtpNotice {
    pub subject: String,
    pub body: String,
}

fn format_expiry(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

impl OtpNotice {
    pub fn render(recipient: &str, token: &OtpToken) -> Self {
        let (subject, action) = match token.purpose {
            OtpPurpose::Checkout => ("Your vehicle checkout OTP", "hand it to the host at pickup"),
            OtpPurpose::Return => ("Your vehicle return OTP", "enter it to confirm the return"),
        };

        let body = format!(
            "Hello {},\n\n\
             Your one-time code for booking {} is {}.\n\
             Please {}. The code expires at {}.\n\n\
             Never share this code with anyone other than your host.\n",
            recipient,
            token.booking_id,
            token.otp.expose(),
            action,
            format_expiry(token.expires_at),
        );

        Self {
            subject: subject.to_string(),
            body,
        }
    }
}

use chrono::{DateTime, Utc};
use fleetbook_shared::Masked;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Booking status in the rental lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Scheduled,
    CheckedOut,
    Returned,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "SCHEDULED",
            BookingStatus::CheckedOut => "CHECKED_OUT",
            BookingStatus::Returned => "RETURNED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    /// Terminal bookings no longer hold the vehicle's calendar.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Returned | BookingStatus::Cancelled)
    }

    /// SCHEDULED → CHECKED_OUT → RETURNED, or SCHEDULED → CANCELLED.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Scheduled, BookingStatus::CheckedOut)
                | (BookingStatus::Scheduled, BookingStatus::Cancelled)
                | (BookingStatus::CheckedOut, BookingStatus::Returned)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(BookingStatus::Scheduled),
            "CHECKED_OUT" => Ok(BookingStatus::CheckedOut),
            "RETURNED" => Ok(BookingStatus::Returned),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

/// Closed interval `[pickup, dropoff]` on a vehicle's calendar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub pickup: DateTime<Utc>,
    pub dropoff: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(pickup: DateTime<Utc>, dropoff: DateTime<Utc>) -> Self {
        Self { pickup, dropoff }
    }

    /// Shared boundaries count as overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.pickup <= other.dropoff && self.dropoff >= other.pickup
    }
}

/// A rental of one vehicle by one seeker from one host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub vehicle_id: i64,
    pub host_id: i64,
    pub seeker_id: i64,
    pub status: BookingStatus,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub booking_amount: Decimal,
    pub overdue_fee_rate_per_hour: Decimal,
    pub actual_pickup_time: Option<DateTime<Utc>>,
    pub actual_dropoff_time: Option<DateTime<Utc>>,
    pub scheduled_pickup_time: DateTime<Utc>,
    pub scheduled_dropoff_time: DateTime<Utc>,
    pub cancellation_allowed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.scheduled_pickup_time, self.scheduled_dropoff_time)
    }

    /// Holds the vehicle's calendar (not RETURNED or CANCELLED).
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Apply a committed status change to this in-memory copy.
    pub fn apply(&mut self, change: &StatusChange) {
        self.status = change.to;
        if change.actual_pickup_time.is_some() {
            self.actual_pickup_time = change.actual_pickup_time;
        }
        if change.actual_dropoff_time.is_some() {
            self.actual_dropoff_time = change.actual_dropoff_time;
        }
        self.updated_at = change.at;
    }
}

/// A conditional status update: it lands only if the stored status is still `from`.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub booking_id: Uuid,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub actual_pickup_time: Option<DateTime<Utc>>,
    pub actual_dropoff_time: Option<DateTime<Utc>>,
    pub at: DateTime<Utc>,
}

impl StatusChange {
    pub fn new(booking_id: Uuid, from: BookingStatus, to: BookingStatus, at: DateTime<Utc>) -> Self {
        Self {
            booking_id,
            from,
            to,
            actual_pickup_time: None,
            actual_dropoff_time: None,
            at,
        }
    }

    pub fn with_pickup(mut self, at: DateTime<Utc>) -> Self {
        self.actual_pickup_time = Some(at);
        self
    }

    pub fn with_dropoff(mut self, at: DateTime<Utc>) -> Self {
        self.actual_dropoff_time = Some(at);
        self
    }
}

/// The gated transition an OTP guards
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpPurpose {
    Checkout,
    Return,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Checkout => "CHECKOUT",
            OtpPurpose::Return => "RETURN",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CHECKOUT" => Ok(OtpPurpose::Checkout),
            "RETURN" => Ok(OtpPurpose::Return),
            other => Err(format!("unknown otp purpose: {}", other)),
        }
    }
}

/// Single-use credential gating a status transition
#[derive(Debug, Clone)]
pub struct OtpToken {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub purpose: OtpPurpose,
    pub otp: Masked<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Settlement record produced at return confirmation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub booking_amount: Decimal,
    pub additional_fees: Decimal,
    pub tax: Decimal,
    pub tax_rate: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Offset/limit window handed to the gateway. Built only from validated paging input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_status_transitions() {
        assert!(BookingStatus::Scheduled.can_transition_to(BookingStatus::CheckedOut));
        assert!(BookingStatus::Scheduled.can_transition_to(BookingStatus::Cancelled));
        assert!(BookingStatus::CheckedOut.can_transition_to(BookingStatus::Returned));

        assert!(!BookingStatus::CheckedOut.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::Scheduled.can_transition_to(BookingStatus::Returned));
        assert!(!BookingStatus::Returned.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::Cancelled.can_transition_to(BookingStatus::Scheduled));
    }

    #[test]
    fn test_status_string_form() {
        for status in [
            BookingStatus::Scheduled,
            BookingStatus::CheckedOut,
            BookingStatus::Returned,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&BookingStatus::CheckedOut).unwrap(),
            "\"CHECKED_OUT\""
        );
    }

    #[test]
    fn test_window_overlap_is_closed() {
        let first = TimeWindow::new(at(1), at(3));

        // Touching at the boundary
        assert!(first.overlaps(&TimeWindow::new(at(3), at(5))));
        assert!(TimeWindow::new(at(3), at(5)).overlaps(&first));

        // Contained and containing
        assert!(first.overlaps(&TimeWindow::new(at(2), at(2))));
        assert!(TimeWindow::new(at(2), at(2)).overlaps(&first));

        // Disjoint
        assert!(!first.overlaps(&TimeWindow::new(at(4), at(6))));
    }
}

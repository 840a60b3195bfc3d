use chrono::{DateTime, Duration, NaiveTime, Utc};
use fleetbook_core::{Booking, Invoice, TimeWindow};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

/// Currency precision for every stored amount.
pub const MONEY_SCALE: u32 = 2;

/// Precision of hourly rates copied onto a booking.
pub const RATE_SCALE: u32 = 4;

/// Floor pickup to 00:00:00.000000 UTC of its date and ceil dropoff to
/// 23:59:59.999999 UTC of its date.
pub fn normalize_window(pickup: DateTime<Utc>, dropoff: DateTime<Utc>) -> TimeWindow {
    let day_start = |at: DateTime<Utc>| at.date_naive().and_time(NaiveTime::MIN).and_utc();

    let start = day_start(pickup);
    let end = day_start(dropoff) + Duration::days(1) - Duration::microseconds(1);

    TimeWindow::new(start, end)
}

/// Whole hours billed for a span, rounding any started hour up. Non-positive spans bill zero.
pub fn billable_hours(span: Duration) -> i64 {
    if span <= Duration::zero() {
        return 0;
    }

    let secs = span.num_seconds();
    let sub_second = span - Duration::seconds(secs);
    let whole = secs / 3600;

    if secs % 3600 > 0 || sub_second > Duration::zero() {
        whole + 1
    } else {
        whole
    }
}

fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds an hourly rate to the precision the bookings table stores.
pub fn round_rate(rate: Decimal) -> Decimal {
    rate.round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Derives every monetary field of a booking and its invoice.
#[derive(Debug, Clone)]
pub struct FeeCalculator {
    tax_rate: Decimal,
}

impl FeeCalculator {
    pub fn new(tax_rate: Decimal) -> Self {
        Self { tax_rate }
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    /// ceil(hours in the normalized window) × hourly rate
    pub fn rental_amount(&self, window: &TimeWindow, rate_per_hour: Decimal) -> Decimal {
        let hours = billable_hours(window.dropoff - window.pickup);
        round_money(Decimal::from(hours) * rate_per_hour)
    }

    /// ceil(max(0, returned_at − scheduled dropoff) in hours)
    pub fn overdue_hours(&self, scheduled_dropoff: DateTime<Utc>, returned_at: DateTime<Utc>) -> i64 {
        billable_hours(returned_at - scheduled_dropoff)
    }

    pub fn overdue_fee(&self, booking: &Booking, returned_at: DateTime<Utc>) -> Decimal {
        let hours = self.overdue_hours(booking.scheduled_dropoff_time, returned_at);
        round_money(Decimal::from(hours) * booking.overdue_fee_rate_per_hour)
    }

    /// Returns `(tax, total)` where total = (booking + fees) × (1 + tax rate) at currency precision.
    pub fn settle(&self, booking_amount: Decimal, additional_fees: Decimal) -> (Decimal, Decimal) {
        let subtotal = booking_amount + additional_fees;
        let total = round_money(subtotal * (Decimal::ONE + self.tax_rate));
        (total - subtotal, total)
    }

    /// Build the settlement record for a booking returned at `returned_at`.
    pub fn invoice(&self, booking: &Booking, returned_at: DateTime<Utc>) -> Invoice {
        let additional_fees = self.overdue_fee(booking, returned_at);
        let (tax, total_amount) = self.settle(booking.booking_amount, additional_fees);

        Invoice {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            booking_amount: booking.booking_amount,
            additional_fees,
            tax,
            tax_rate: self.tax_rate,
            total_amount,
            created_at: returned_at,
        }
    }
}

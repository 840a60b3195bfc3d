use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, Invoice, OtpPurpose, OtpToken, PageRequest, StatusChange, TimeWindow};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

/// Persistence gateway for bookings, OTP tokens and invoices.
///
/// Single-statement reads and writes live here. Anything that must land
/// together goes through a [`BookingTransaction`] obtained from [`begin`].
///
/// [`begin`]: BookingStore::begin
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn BookingTransaction>, StoreError>;

    async fn booking_by_id(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// True if a non-terminal booking for the vehicle intersects `window`.
    async fn has_overlap(&self, vehicle_id: i64, window: &TimeWindow) -> Result<bool, StoreError>;

    async fn active_token(
        &self,
        booking_id: Uuid,
        purpose: OtpPurpose,
    ) -> Result<Option<OtpToken>, StoreError>;

    async fn delete_token(&self, token_id: Uuid) -> Result<(), StoreError>;

    /// Conditional single-row update; `false` when the stored status was no longer `change.from`.
    async fn update_status(&self, change: &StatusChange) -> Result<bool, StoreError>;

    async fn invoice_for_booking(&self, booking_id: Uuid) -> Result<Option<Invoice>, StoreError>;

    /// Newest first. Returns the page and the total number of matching bookings.
    async fn bookings_for_seeker(
        &self,
        seeker_id: i64,
        page: PageRequest,
    ) -> Result<(Vec<Booking>, i64), StoreError>;

    async fn bookings_for_host(
        &self,
        host_id: i64,
        page: PageRequest,
    ) -> Result<(Vec<Booking>, i64), StoreError>;
}

/// Unit of work. Dropping it without [`commit`](BookingTransaction::commit) discards every write.
#[async_trait]
pub trait BookingTransaction: Send {
    /// Atomically re-checks the vehicle calendar and inserts `booking` if the
    /// window is still free. Returns `false` (and writes nothing) on conflict.
    async fn reserve_if_free(&mut self, booking: &Booking) -> Result<bool, StoreError>;

    /// Stores `token`, replacing any token with the same booking and purpose.
    async fn put_token(&mut self, token: &OtpToken) -> Result<(), StoreError>;

    async fn apply_transition(&mut self, change: &StatusChange) -> Result<bool, StoreError>;

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Statuses that hold a vehicle's calendar, in storage form.
pub fn active_statuses() -> [&'static str; 2] {
    [BookingStatus::Scheduled.as_str(), BookingStatus::CheckedOut.as_str()]
}

use async_trait::async_trait;
use fleetbook_core::{
    Booking, BookingStore, BookingTransaction, Invoice, OtpPurpose, OtpToken, PageRequest, StatusChange,
    StoreError, TimeWindow,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    bookings: HashMap<Uuid, Booking>,
    tokens: HashMap<(Uuid, OtpPurpose), OtpToken>,
    /// Keyed by booking id; at most one invoice per booking
    invoices: HashMap<Uuid, Invoice>,
}

impl MemoryState {
    fn has_overlap(&self, vehicle_id: i64, window: &TimeWindow) -> bool {
        self.bookings
            .values()
            .any(|b| b.vehicle_id == vehicle_id && b.is_active() && b.window().overlaps(window))
    }

    fn apply(&mut self, change: &StatusChange) -> bool {
        match self.bookings.get_mut(&change.booking_id) {
            Some(booking) if booking.status == change.from => {
                booking.apply(change);
                true
            }
            _ => false,
        }
    }

    fn page<F>(&self, matches: F, page: PageRequest) -> (Vec<Booking>, i64)
    where
        F: Fn(&Booking) -> bool,
    {
        let mut found: Vec<&Booking> = self.bookings.values().filter(|b| matches(b)).collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let total = found.len() as i64;
        let items = found
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();

        (items, total)
    }
}

#[derive(Debug)]
struct MemoryFailure(&'static str);

impl std::fmt::Display for MemoryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for MemoryFailure {}

/// Process-local booking gateway.
///
/// One mutex guards all state; a transaction holds it from `begin` until
/// commit or rollback and works on a copy that is swapped in on commit.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    state: Arc<Mutex<MemoryState>>,
    fail_token_deletes: Arc<AtomicBool>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `delete_token` call fail until switched off again.
    pub fn set_fail_token_deletes(&self, fail: bool) {
        self.fail_token_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.state.lock().await.bookings.values().cloned().collect()
    }

    pub async fn tokens(&self) -> Vec<OtpToken> {
        self.state.lock().await.tokens.values().cloned().collect()
    }

    pub async fn invoices(&self) -> Vec<Invoice> {
        self.state.lock().await.invoices.values().cloned().collect()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn begin(&self) -> Result<Box<dyn BookingTransaction>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }

    async fn booking_by_id(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn has_overlap(&self, vehicle_id: i64, window: &TimeWindow) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.has_overlap(vehicle_id, window))
    }

    async fn active_token(&self, booking_id: Uuid, purpose: OtpPurpose) -> Result<Option<OtpToken>, StoreError> {
        Ok(self.state.lock().await.tokens.get(&(booking_id, purpose)).cloned())
    }

    async fn delete_token(&self, token_id: Uuid) -> Result<(), StoreError> {
        if self.fail_token_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::backend(MemoryFailure("token delete failed")));
        }
        self.state.lock().await.tokens.retain(|_, t| t.id != token_id);
        Ok(())
    }

    async fn update_status(&self, change: &StatusChange) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.apply(change))
    }

    async fn invoice_for_booking(&self, booking_id: Uuid) -> Result<Option<Invoice>, StoreError> {
        Ok(self.state.lock().await.invoices.get(&booking_id).cloned())
    }

    async fn bookings_for_seeker(&self, seeker_id: i64, page: PageRequest) -> Result<(Vec<Booking>, i64), StoreError> {
        Ok(self.state.lock().await.page(|b| b.seeker_id == seeker_id, page))
    }

    async fn bookings_for_host(&self, host_id: i64, page: PageRequest) -> Result<(Vec<Booking>, i64), StoreError> {
        Ok(self.state.lock().await.page(|b| b.host_id == host_id, page))
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl BookingTransaction for InMemoryTransaction {
    async fn reserve_if_free(&mut self, booking: &Booking) -> Result<bool, StoreError> {
        if self.working.has_overlap(booking.vehicle_id, &booking.window()) {
            return Ok(false);
        }
        self.working.bookings.insert(booking.id, booking.clone());
        Ok(true)
    }

    async fn put_token(&mut self, token: &OtpToken) -> Result<(), StoreError> {
        self.working
            .tokens
            .insert((token.booking_id, token.purpose), token.clone());
        Ok(())
    }

    async fn apply_transition(&mut self, change: &StatusChange) -> Result<bool, StoreError> {
        Ok(self.working.apply(change))
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), StoreError> {
        if self.working.invoices.contains_key(&invoice.booking_id) {
            return Err(StoreError::backend(MemoryFailure("duplicate invoice for booking")));
        }
        self.working.invoices.insert(invoice.booking_id, invoice.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use fleetbook_core::BookingStatus;
    use fleetbook_shared::Masked;
    use rust_decimal::Decimal;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, 0, 0, 0).unwrap()
    }

    fn booking(vehicle_id: i64, seeker_id: i64, from: u32, to: u32) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            vehicle_id,
            host_id: 1,
            seeker_id,
            status: BookingStatus::Scheduled,
            pickup_location: "Depot".to_string(),
            dropoff_location: "Depot".to_string(),
            booking_amount: Decimal::new(100, 0),
            overdue_fee_rate_per_hour: Decimal::ZERO,
            actual_pickup_time: None,
            actual_dropoff_time: None,
            scheduled_pickup_time: day(from),
            scheduled_dropoff_time: day(to),
            cancellation_allowed: true,
            created_at: day(from),
            updated_at: day(from),
        }
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = InMemoryBookingStore::new();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.reserve_if_free(&booking(7, 2, 1, 2)).await.unwrap());
        tx.rollback().await.unwrap();

        assert!(store.bookings().await.is_empty());
    }

    #[tokio::test]
    async fn test_reserve_rejects_touching_window() {
        let store = InMemoryBookingStore::new();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.reserve_if_free(&booking(7, 2, 1, 3)).await.unwrap());
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(!tx.reserve_if_free(&booking(7, 3, 3, 5)).await.unwrap());
        assert!(tx.reserve_if_free(&booking(8, 3, 3, 5)).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(store.bookings().await.len(), 2);
    }

    #[tokio::test]
    async fn test_conditional_update_only_from_expected_status() {
        let store = InMemoryBookingStore::new();
        let b = booking(7, 2, 1, 2);

        let mut tx = store.begin().await.unwrap();
        tx.reserve_if_free(&b).await.unwrap();
        tx.commit().await.unwrap();

        let change = StatusChange::new(b.id, BookingStatus::Scheduled, BookingStatus::Cancelled, day(1));
        assert!(store.update_status(&change).await.unwrap());
        assert!(!store.update_status(&change).await.unwrap());

        // Cancelled bookings free the calendar
        assert!(!store.has_overlap(7, &b.window()).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_token_supersedes_same_purpose() {
        let store = InMemoryBookingStore::new();
        let booking_id = Uuid::new_v4();
        let token = |code: &str| OtpToken {
            id: Uuid::new_v4(),
            booking_id,
            purpose: OtpPurpose::Return,
            otp: Masked(code.to_string()),
            expires_at: day(2) + Duration::minutes(10),
            created_at: day(2),
        };

        let mut tx = store.begin().await.unwrap();
        tx.put_token(&token("111111")).await.unwrap();
        tx.put_token(&token("222222")).await.unwrap();
        tx.commit().await.unwrap();

        let active = store.active_token(booking_id, OtpPurpose::Return).await.unwrap().unwrap();
        assert_eq!(active.otp.expose(), "222222");
        assert_eq!(store.tokens().await.len(), 1);
        assert!(store.active_token(booking_id, OtpPurpose::Checkout).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listing_is_newest_first_with_total() {
        let store = InMemoryBookingStore::new();

        let mut tx = store.begin().await.unwrap();
        for (from, to) in [(1, 2), (4, 5), (7, 8)] {
            tx.reserve_if_free(&booking(7, 2, from, to)).await.unwrap();
        }
        tx.reserve_if_free(&booking(9, 3, 1, 2)).await.unwrap();
        tx.commit().await.unwrap();

        let (items, total) = store
            .bookings_for_seeker(2, PageRequest { offset: 1, limit: 1 })
            .await
            .unwrap();

        assert_eq!(total, 3);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].scheduled_pickup_time, day(4));
    }
}

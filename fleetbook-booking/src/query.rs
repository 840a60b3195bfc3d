use fleetbook_core::{
    Actor, Booking, BookingError, BookingResult, BookingStore, Invoice, Page, PageRequest, User, UserDirectory,
    Vehicle, VehicleDirectory,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Vehicle fields shown next to a booking in listings
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VehicleOverview {
    pub id: i64,
    pub make: String,
    pub model: String,
    pub rate_per_hour: Decimal,
}

impl From<&Vehicle> for VehicleOverview {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id,
            make: vehicle.make.clone(),
            model: vehicle.model.clone(),
            rate_per_hour: vehicle.rate_per_hour,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    pub booking: Booking,
    /// `None` when the vehicle service no longer knows the vehicle.
    pub vehicle: Option<VehicleOverview>,
}

/// Read-only composition of a booking with everything it references
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetails {
    pub booking: Booking,
    pub host: User,
    pub seeker: User,
    pub vehicle: Vehicle,
    pub invoice: Option<Invoice>,
}

/// Validate 1-based paging input before anything touches storage.
pub fn page_request(page: i64, limit: i64) -> BookingResult<PageRequest> {
    if page < 1 || limit < 1 {
        return Err(BookingError::InvalidPagination);
    }

    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or(BookingError::InvalidPagination)?;

    Ok(PageRequest { offset, limit })
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Seeker,
    Host,
}

pub struct BookingQueryService {
    store: Arc<dyn BookingStore>,
    vehicles: Arc<dyn VehicleDirectory>,
    users: Arc<dyn UserDirectory>,
}

impl BookingQueryService {
    pub fn new(
        store: Arc<dyn BookingStore>,
        vehicles: Arc<dyn VehicleDirectory>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self { store, vehicles, users }
    }

    /// Bookings the actor made, newest first.
    pub async fn seeker_bookings(&self, actor: &Actor, page: i64, limit: i64) -> BookingResult<Page<BookingSummary>> {
        self.list(Side::Seeker, actor, page, limit).await
    }

    /// Bookings of the actor's vehicles, newest first.
    pub async fn host_bookings(&self, actor: &Actor, page: i64, limit: i64) -> BookingResult<Page<BookingSummary>> {
        self.list(Side::Host, actor, page, limit).await
    }

    async fn list(&self, side: Side, actor: &Actor, page: i64, limit: i64) -> BookingResult<Page<BookingSummary>> {
        let request = page_request(page, limit)?;

        let (bookings, total) = match side {
            Side::Seeker => self.store.bookings_for_seeker(actor.user_id, request).await?,
            Side::Host => self.store.bookings_for_host(actor.user_id, request).await?,
        };

        let mut overviews: HashMap<i64, Option<VehicleOverview>> = HashMap::new();
        let mut items = Vec::with_capacity(bookings.len());

        for booking in bookings {
            let vehicle = match overviews.get(&booking.vehicle_id) {
                Some(cached) => cached.clone(),
                None => {
                    let found = self
                        .vehicles
                        .vehicle_by_id(booking.vehicle_id)
                        .await?
                        .map(|v| VehicleOverview::from(&v));
                    overviews.insert(booking.vehicle_id, found.clone());
                    found
                }
            };
            items.push(BookingSummary { booking, vehicle });
        }

        Ok(Page {
            items,
            total,
            page,
            limit,
        })
    }

    /// Booking with host, seeker, vehicle and invoice (once returned).
    pub async fn booking_details(&self, booking_id: Uuid) -> BookingResult<BookingDetails> {
        let booking = self
            .store
            .booking_by_id(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound)?;

        let host = self.user(booking.host_id).await?;
        let seeker = self.user(booking.seeker_id).await?;
        let vehicle = self
            .vehicles
            .vehicle_by_id(booking.vehicle_id)
            .await?
            .ok_or(BookingError::VehicleNotFound)?;
        let invoice = self.store.invoice_for_booking(booking.id).await?;

        Ok(BookingDetails {
            booking,
            host,
            seeker,
            vehicle,
            invoice,
        })
    }

    async fn user(&self, user_id: i64) -> BookingResult<User> {
        self.users.user_by_id(user_id).await?.ok_or(BookingError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_offsets() {
        assert_eq!(page_request(1, 20).unwrap(), PageRequest { offset: 0, limit: 20 });
        assert_eq!(page_request(3, 10).unwrap(), PageRequest { offset: 20, limit: 10 });
    }

    #[test]
    fn test_page_request_rejects_non_positive() {
        for (page, limit) in [(0, 10), (1, 0), (-1, 10), (1, -5), (0, 0)] {
            assert!(matches!(page_request(page, limit), Err(BookingError::InvalidPagination)));
        }
    }

    #[test]
    fn test_page_request_rejects_overflow() {
        assert!(matches!(page_request(i64::MAX, 2), Err(BookingError::InvalidPagination)));
    }
}

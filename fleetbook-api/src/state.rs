use fleetbook_booking::{BookingController, BookingQueryService};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingController>,
    pub queries: Arc<BookingQueryService>,
    pub auth: AuthConfig,
}

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use fleetbook_booking::{BookingController, BookingQueryService, CreateBookingRequest, LifecycleConfig};
use fleetbook_core::{
    Actor, BookingStore, Clock, Notifier, OtpPurpose, Role, StoreError, User, UserDirectory, Vehicle,
    VehicleDirectory,
};
use fleetbook_shared::Masked;
use fleetbook_store::InMemoryBookingStore;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const HOST: i64 = 10;
pub const OTHER_HOST: i64 = 11;
pub const SEEKER: i64 = 20;
pub const OTHER_SEEKER: i64 = 21;

/// Rate 100/h, overdue 150/h, seekers may cancel
pub const CAR: i64 = 1;
/// Seekers may not cancel
pub const STRICT_CAR: i64 = 2;
pub const DELETED_CAR: i64 = 3;
/// Owned by `OTHER_HOST`
pub const VAN: i64 = 4;

pub fn utc(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap()
}

pub fn host() -> Actor {
    Actor::new(HOST, Role::Host)
}

pub fn seeker() -> Actor {
    Actor::new(SEEKER, Role::Seeker)
}

pub fn other_seeker() -> Actor {
    Actor::new(OTHER_SEEKER, Role::Seeker)
}

pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to_name: String,
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentEmail>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(
        &self,
        to_name: &str,
        to_email: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("smtp relay unavailable".into());
        }
        self.sent.lock().unwrap().push(SentEmail {
            to_name: to_name.to_string(),
            to_email: to_email.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub struct FakeDirectory {
    vehicles: HashMap<i64, Vehicle>,
    users: HashMap<i64, User>,
}

fn vehicle(id: i64, host_id: i64, cancellation_allowed: bool, is_deleted: bool) -> Vehicle {
    Vehicle {
        id,
        host_id,
        make: "Toyota".to_string(),
        model: format!("Model {}", id),
        rate_per_hour: Decimal::from(100),
        overdue_fee_rate_per_hour: Decimal::from(150),
        cancellation_allowed,
        is_deleted,
    }
}

fn user(id: i64, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
        email: Masked(format!("{}@example.com", name.to_lowercase())),
    }
}

impl Default for FakeDirectory {
    fn default() -> Self {
        let vehicles = [
            vehicle(CAR, HOST, true, false),
            vehicle(STRICT_CAR, HOST, false, false),
            vehicle(DELETED_CAR, HOST, true, true),
            vehicle(VAN, OTHER_HOST, true, false),
        ];
        let users = [
            user(HOST, "Harper"),
            user(OTHER_HOST, "Imani"),
            user(SEEKER, "Asha"),
            user(OTHER_SEEKER, "Bodhi"),
        ];

        Self {
            vehicles: vehicles.into_iter().map(|v| (v.id, v)).collect(),
            users: users.into_iter().map(|u| (u.id, u)).collect(),
        }
    }
}

#[async_trait]
impl VehicleDirectory for FakeDirectory {
    async fn vehicle_by_id(&self, id: i64) -> Result<Option<Vehicle>, StoreError> {
        Ok(self.vehicles.get(&id).cloned())
    }
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).cloned())
    }
}

/// Controller and query service wired over the in-memory gateway, with the clock at 2025-01-01 08:00 UTC.
pub struct Harness {
    pub store: InMemoryBookingStore,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<TestClock>,
    pub controller: BookingController,
    pub queries: BookingQueryService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(InMemoryBookingStore::new())
    }

    pub fn with_store(store: InMemoryBookingStore) -> Self {
        let directory = Arc::new(FakeDirectory::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(TestClock::at(utc(1, 8)));
        let gateway: Arc<dyn BookingStore> = Arc::new(store.clone());

        let controller = BookingController::new(
            gateway.clone(),
            directory.clone(),
            directory.clone(),
            notifier.clone(),
            LifecycleConfig::default(),
        )
        .with_clock(clock.clone());
        let queries = BookingQueryService::new(gateway, directory.clone(), directory);

        Self {
            store,
            notifier,
            clock,
            controller,
            queries,
        }
    }

    pub async fn code(&self, booking_id: Uuid, purpose: OtpPurpose) -> String {
        self.store
            .active_token(booking_id, purpose)
            .await
            .unwrap()
            .map(|t| t.otp.expose().clone())
            .unwrap_or_default()
    }
}

pub fn request(vehicle_id: i64, pickup: DateTime<Utc>, dropoff: DateTime<Utc>) -> CreateBookingRequest {
    CreateBookingRequest {
        vehicle_id: Some(vehicle_id),
        pickup_location: "Airport T1".to_string(),
        dropoff_location: "Central Station".to_string(),
        scheduled_pickup_time: Some(pickup),
        scheduled_dropoff_time: Some(dropoff),
    }
}

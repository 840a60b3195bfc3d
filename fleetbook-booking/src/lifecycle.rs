use chrono::{DateTime, Duration, Utc};
use fleetbook_core::{
    Actor, Booking, BookingError, BookingResult, BookingStatus, BookingStore, BookingTransaction, Clock, Invoice,
    Notifier, OtpPurpose, OtpToken, StatusChange, SystemClock, User, UserDirectory, VehicleDirectory,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::fees::{normalize_window, round_rate, FeeCalculator};
use crate::notice::OtpNotice;
use crate::otp::{OtpIssuer, DEFAULT_OTP_LENGTH};
use crate::request::CreateBookingRequest;

/// Tunables of the lifecycle controller
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Flat tax rate applied at settlement (0.18 = 18%)
    pub tax_rate: Decimal,
    /// Validity of the code issued by [`BookingController::initiate_return`]
    pub return_otp_ttl: Duration,
    pub otp_length: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(18, 2),
            return_otp_ttl: Duration::minutes(10),
            otp_length: DEFAULT_OTP_LENGTH,
        }
    }
}

/// Outcome of issuing a return code
#[derive(Debug, Clone, Serialize)]
pub struct ReturnInitiated {
    pub booking_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a confirmed return
#[derive(Debug, Clone, Serialize)]
pub struct ReturnReceipt {
    pub booking: Booking,
    pub invoice: Invoice,
}

/// Drives bookings through SCHEDULED → CHECKED_OUT → RETURNED and SCHEDULED → CANCELLED.
///
/// Every operation takes the caller explicitly. Operations with more than one
/// write run inside a single gateway transaction; the e-mail step of
/// [`create_booking`](Self::create_booking) and
/// [`initiate_return`](Self::initiate_return) is part of that transaction, so a
/// failed delivery rolls everything back.
pub struct BookingController {
    store: Arc<dyn BookingStore>,
    vehicles: Arc<dyn VehicleDirectory>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    otp: OtpIssuer,
    fees: FeeCalculator,
    return_otp_ttl: Duration,
}

impl BookingController {
    pub fn new(
        store: Arc<dyn BookingStore>,
        vehicles: Arc<dyn VehicleDirectory>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            vehicles,
            users,
            notifier,
            clock: Arc::new(SystemClock),
            otp: OtpIssuer::new(config.otp_length),
            fees: FeeCalculator::new(config.tax_rate),
            return_otp_ttl: config.return_otp_ttl,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Reserve a vehicle for the seeker and e-mail the checkout code.
    pub async fn create_booking(&self, actor: &Actor, request: CreateBookingRequest) -> BookingResult<Booking> {
        let now = self.clock.now();
        let input = request.check(now.date_naive())?;

        let vehicle = self
            .vehicles
            .vehicle_by_id(input.vehicle_id)
            .await?
            .filter(|v| !v.is_deleted)
            .ok_or(BookingError::VehicleNotFound)?;

        let window = normalize_window(input.scheduled_pickup_time, input.scheduled_dropoff_time);
        if self.store.has_overlap(vehicle.id, &window).await? {
            return Err(BookingError::BookingConflict);
        }

        let seeker = self.user(actor.user_id).await?;

        let booking = Booking {
            id: Uuid::new_v4(),
            vehicle_id: vehicle.id,
            host_id: vehicle.host_id,
            seeker_id: seeker.id,
            status: BookingStatus::Scheduled,
            pickup_location: input.pickup_location.clone(),
            dropoff_location: input.dropoff_location.clone(),
            booking_amount: self.fees.rental_amount(&window, vehicle.rate_per_hour),
            overdue_fee_rate_per_hour: round_rate(vehicle.overdue_fee_rate_per_hour),
            actual_pickup_time: None,
            actual_dropoff_time: None,
            scheduled_pickup_time: window.pickup,
            scheduled_dropoff_time: window.dropoff,
            cancellation_allowed: vehicle.cancellation_allowed,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        let outcome = self.reserve(tx.as_mut(), &booking, &seeker, now).await;
        finish(tx, outcome).await?;

        info!(
            "Booking {} created for vehicle {} by seeker {} ({} to {})",
            booking.id, booking.vehicle_id, booking.seeker_id, booking.scheduled_pickup_time, booking.scheduled_dropoff_time
        );
        Ok(booking)
    }

    async fn reserve(
        &self,
        tx: &mut dyn BookingTransaction,
        booking: &Booking,
        seeker: &User,
        now: DateTime<Utc>,
    ) -> BookingResult<()> {
        if !tx.reserve_if_free(booking).await? {
            return Err(BookingError::BookingConflict);
        }

        let token = self
            .otp
            .issue(booking.id, OtpPurpose::Checkout, booking.scheduled_dropoff_time, now);
        tx.put_token(&token).await?;

        self.notify(seeker, &token).await
    }

    /// Host or seeker cancels a scheduled booking. Seekers need the vehicle's
    /// cancellation policy to allow it; hosts do not.
    pub async fn cancel_booking(&self, actor: &Actor, booking_id: Uuid) -> BookingResult<Booking> {
        let mut booking = self.booking(booking_id).await?;

        let is_host = actor.is(booking.host_id);
        if !is_host && !actor.is(booking.seeker_id) {
            return Err(BookingError::Forbidden);
        }
        if !is_host && !booking.cancellation_allowed {
            return Err(BookingError::CancellationNotAllowed);
        }
        ensure_transition(&booking, BookingStatus::Cancelled)?;

        let change = StatusChange::new(booking.id, booking.status, BookingStatus::Cancelled, self.clock.now());
        if !self.store.update_status(&change).await? {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Cancelled,
            });
        }

        booking.apply(&change);
        info!("Booking {} cancelled by user {}", booking.id, actor.user_id);

        match self.store.active_token(booking.id, OtpPurpose::Checkout).await {
            Ok(Some(token)) => self.discard_token(&token).await,
            Ok(None) => {}
            Err(e) => warn!("Failed to look up checkout OTP for cancelled booking {}: {}", booking.id, e),
        }
        Ok(booking)
    }

    /// Host hands over the vehicle after checking the seeker's checkout code.
    pub async fn confirm_pickup(&self, actor: &Actor, booking_id: Uuid, otp: &str) -> BookingResult<Booking> {
        let mut booking = self.booking(booking_id).await?;

        if !actor.is(booking.host_id) {
            return Err(BookingError::Forbidden);
        }

        // Code first: a consumed token reads as a bad code, not as a state error
        let now = self.clock.now();
        let token = self.verified_token(&booking, OtpPurpose::Checkout, otp, now).await?;
        ensure_transition(&booking, BookingStatus::CheckedOut)?;

        let change = StatusChange::new(booking.id, BookingStatus::Scheduled, BookingStatus::CheckedOut, now)
            .with_pickup(now);

        let mut tx = self.store.begin().await?;
        let outcome = transition(tx.as_mut(), &change).await;
        finish(tx, outcome).await?;

        self.discard_token(&token).await;

        booking.apply(&change);
        info!("Booking {} checked out at {}", booking.id, now);
        Ok(booking)
    }

    /// Host starts the return; the seeker receives a fresh short-lived code.
    pub async fn initiate_return(&self, actor: &Actor, booking_id: Uuid) -> BookingResult<ReturnInitiated> {
        let booking = self.booking(booking_id).await?;

        if !actor.is(booking.host_id) {
            return Err(BookingError::Forbidden);
        }
        ensure_transition(&booking, BookingStatus::Returned)?;

        let seeker = self.user(booking.seeker_id).await?;

        let now = self.clock.now();
        let token = self
            .otp
            .issue(booking.id, OtpPurpose::Return, now + self.return_otp_ttl, now);

        let mut tx = self.store.begin().await?;
        let outcome = self.issue_return_token(tx.as_mut(), &seeker, &token).await;
        finish(tx, outcome).await?;

        info!("Return initiated for booking {}, code valid until {}", booking.id, token.expires_at);
        Ok(ReturnInitiated {
            booking_id: booking.id,
            expires_at: token.expires_at,
        })
    }

    async fn issue_return_token(
        &self,
        tx: &mut dyn BookingTransaction,
        seeker: &User,
        token: &OtpToken,
    ) -> BookingResult<()> {
        tx.put_token(token).await?;
        self.notify(seeker, token).await
    }

    /// Seeker confirms the return with the code from [`initiate_return`](Self::initiate_return);
    /// the booking is settled and invoiced in the same transaction.
    pub async fn confirm_return(&self, actor: &Actor, booking_id: Uuid, otp: &str) -> BookingResult<ReturnReceipt> {
        let mut booking = self.booking(booking_id).await?;

        if !actor.is(booking.seeker_id) {
            return Err(BookingError::Forbidden);
        }

        let now = self.clock.now();
        let token = self.verified_token(&booking, OtpPurpose::Return, otp, now).await?;
        ensure_transition(&booking, BookingStatus::Returned)?;

        let change = StatusChange::new(booking.id, BookingStatus::CheckedOut, BookingStatus::Returned, now)
            .with_dropoff(now);
        let invoice = self.fees.invoice(&booking, now);

        let mut tx = self.store.begin().await?;
        let outcome = settle(tx.as_mut(), &change, &invoice).await;
        finish(tx, outcome).await?;

        self.discard_token(&token).await;

        booking.apply(&change);
        info!(
            "Booking {} returned at {}, invoice {} total {}",
            booking.id, now, invoice.id, invoice.total_amount
        );
        Ok(ReturnReceipt { booking, invoice })
    }

    async fn booking(&self, booking_id: Uuid) -> BookingResult<Booking> {
        self.store
            .booking_by_id(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound)
    }

    async fn user(&self, user_id: i64) -> BookingResult<User> {
        self.users.user_by_id(user_id).await?.ok_or(BookingError::UserNotFound)
    }

    /// A failed lookup counts as a failed verification.
    async fn verified_token(
        &self,
        booking: &Booking,
        purpose: OtpPurpose,
        otp: &str,
        now: DateTime<Utc>,
    ) -> BookingResult<OtpToken> {
        let token = match self.store.active_token(booking.id, purpose).await {
            Ok(token) => token,
            Err(e) => {
                warn!("OTP lookup failed for booking {}: {}", booking.id, e);
                None
            }
        };

        self.otp.verify(token.as_ref(), booking.id, otp, now)?;
        token.ok_or(BookingError::InvalidOtp)
    }

    async fn notify(&self, recipient: &User, token: &OtpToken) -> BookingResult<()> {
        let notice = OtpNotice::render(&recipient.name, token);

        self.notifier
            .send_email(&recipient.name, recipient.email.expose(), &notice.subject, &notice.body)
            .await
            .map_err(|e| {
                error!(
                    "Failed to send {} OTP for booking {} to user {}: {}",
                    token.purpose, token.booking_id, recipient.id, e
                );
                BookingError::internal(format!("notification delivery failed: {}", e))
            })
    }

    /// Post-commit cleanup. The guarded transition has already happened, so a
    /// leftover token is inert and a failure here is only logged.
    async fn discard_token(&self, token: &OtpToken) {
        if let Err(e) = self.store.delete_token(token.id).await {
            warn!(
                "Failed to delete {} OTP {} for booking {}: {}",
                token.purpose, token.id, token.booking_id, e
            );
        }
    }
}

fn ensure_transition(booking: &Booking, to: BookingStatus) -> BookingResult<()> {
    if booking.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(BookingError::InvalidTransition {
            from: booking.status,
            to,
        })
    }
}

async fn transition(tx: &mut dyn BookingTransaction, change: &StatusChange) -> BookingResult<()> {
    // Loses only to a concurrent request that moved the booking first.
    if !tx.apply_transition(change).await? {
        return Err(BookingError::InvalidTransition {
            from: change.from,
            to: change.to,
        });
    }
    Ok(())
}

async fn settle(tx: &mut dyn BookingTransaction, change: &StatusChange, invoice: &Invoice) -> BookingResult<()> {
    transition(tx, change).await?;
    tx.insert_invoice(invoice).await?;
    Ok(())
}

/// Commit on success, roll back on failure, surfacing the first error.
async fn finish<T>(tx: Box<dyn BookingTransaction>, outcome: BookingResult<T>) -> BookingResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                error!("Rollback failed after {}: {}", e, rollback);
            }
            Err(e)
        }
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use fleetbook_core::BookingError;
use serde::Deserialize;
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    #[validate(required)]
    pub vehicle_id: Option<i64>,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub pickup_location: String,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub dropoff_location: String,
    #[validate(required)]
    pub scheduled_pickup_time: Option<DateTime<Utc>>,
    #[validate(required)]
    pub scheduled_dropoff_time: Option<DateTime<Utc>>,
}

/// A create request that passed every field-level rule.
#[derive(Debug, Clone)]
pub struct BookingInput {
    pub vehicle_id: i64,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub scheduled_pickup_time: DateTime<Utc>,
    pub scheduled_dropoff_time: DateTime<Utc>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some(Cow::from("must not be blank"));
        return Err(err);
    }
    Ok(())
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::from(message));
    err
}

/// One line per violated rule, sorted so the aggregate error is stable.
fn describe(errors: &ValidationErrors) -> Vec<String> {
    let mut lines: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => format!("{} {}", field, msg),
                None => format!("{} is {}", field, e.code),
            })
        })
        .collect();
    lines.sort();
    lines
}

impl CreateBookingRequest {
    /// Runs every rule and reports all violations together.
    ///
    /// `today` is the current UTC date: pickup may not fall on an earlier day.
    pub fn check(self, today: NaiveDate) -> Result<BookingInput, BookingError> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        if let (Some(pickup), Some(dropoff)) = (self.scheduled_pickup_time, self.scheduled_dropoff_time) {
            if pickup >= dropoff {
                errors.add(
                    "scheduled_pickup_time",
                    rule("pickup_before_dropoff", "must be before scheduled_dropoff_time"),
                );
            }
            if pickup.date_naive() < today {
                errors.add(
                    "scheduled_pickup_time",
                    rule("not_in_past", "must not be before today (UTC)"),
                );
            }
        }

        let violations = describe(&errors);

        match (self.vehicle_id, self.scheduled_pickup_time, self.scheduled_dropoff_time) {
            (Some(vehicle_id), Some(pickup), Some(dropoff)) if violations.is_empty() => Ok(BookingInput {
                vehicle_id,
                pickup_location: self.pickup_location.trim().to_string(),
                dropoff_location: self.dropoff_location.trim().to_string(),
                scheduled_pickup_time: pickup,
                scheduled_dropoff_time: dropoff,
            }),
            _ => Err(BookingError::InvalidRequest(violations)),
        }
    }
}

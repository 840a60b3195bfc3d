pub mod actor;
pub mod clock;
pub mod directory;
pub mod models;
pub mod notify;
pub mod repository;

pub use actor::{Actor, Role};
pub use clock::{Clock, SystemClock};
pub use directory::{User, UserDirectory, Vehicle, VehicleDirectory};
pub use models::{Booking, BookingStatus, Invoice, OtpPurpose, OtpToken, Page, PageRequest, StatusChange, TimeWindow};
pub use notify::Notifier;
pub use repository::{BookingStore, BookingTransaction, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid request: {}", .0.join("; "))]
    InvalidRequest(Vec<String>),
    #[error("Invalid pagination: page and limit must both be at least 1")]
    InvalidPagination,
    #[error("Vehicle not found")]
    VehicleNotFound,
    #[error("Booking not found")]
    BookingNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Vehicle is already booked for an overlapping window")]
    BookingConflict,
    #[error("Action forbidden")]
    Forbidden,
    #[error("Booking cancellation is not allowed for this vehicle")]
    CancellationNotAllowed,
    #[error("Invalid OTP")]
    InvalidOtp,
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type BookingResult<T> = Result<T, BookingError>;

/// Stable classification of a [`BookingError`] for the outer boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    NotFound,
    Conflict,
    Forbidden,
    InvalidOtp,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::InvalidRequest | ErrorKind::InvalidOtp => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Forbidden => 403,
            ErrorKind::Internal => 500,
        }
    }
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::InvalidRequest(_) | BookingError::InvalidPagination => ErrorKind::InvalidRequest,
            BookingError::VehicleNotFound | BookingError::BookingNotFound | BookingError::UserNotFound => {
                ErrorKind::NotFound
            }
            BookingError::BookingConflict => ErrorKind::Conflict,
            // Illegal transitions share the access-denial shape.
            BookingError::Forbidden
            | BookingError::CancellationNotAllowed
            | BookingError::InvalidTransition { .. } => ErrorKind::Forbidden,
            BookingError::InvalidOtp => ErrorKind::InvalidOtp,
            BookingError::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand to callers. Internal detail never leaves the process.
    pub fn public_message(&self) -> String {
        match self {
            BookingError::InvalidTransition { .. } => BookingError::Forbidden.to_string(),
            BookingError::InternalError(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        BookingError::InternalError(err.to_string())
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        BookingError::InternalError(err.to_string())
    }
}

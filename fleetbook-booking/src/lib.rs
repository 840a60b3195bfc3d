pub mod fees;
pub mod lifecycle;
pub mod notice;
pub mod otp;
pub mod query;
pub mod request;

pub use fees::FeeCalculator;
pub use lifecycle::{BookingController, LifecycleConfig, ReturnInitiated, ReturnReceipt};
pub use otp::OtpIssuer;
pub use query::{BookingDetails, BookingQueryService, BookingSummary, VehicleOverview};
pub use request::CreateBookingRequest;

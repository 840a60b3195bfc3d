pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod directory_repo;
pub mod mailer;
pub mod memory;

pub use booking_repo::PgBookingStore;
pub use database::DbClient;
pub use directory_repo::{PgUserDirectory, PgVehicleDirectory};
pub use mailer::SmtpNotifier;
pub use memory::InMemoryBookingStore;

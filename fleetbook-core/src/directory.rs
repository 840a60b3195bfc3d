use async_trait::async_trait;
use fleetbook_shared::Masked;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::repository::StoreError;

/// Vehicle as published by the vehicle service. Read-only for bookings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub host_id: i64,
    pub make: String,
    pub model: String,
    pub rate_per_hour: Decimal,
    pub overdue_fee_rate_per_hour: Decimal,
    pub cancellation_allowed: bool,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: Masked<String>,
}

#[async_trait]
pub trait VehicleDirectory: Send + Sync {
    /// Returns soft-deleted vehicles too; callers decide what a deleted vehicle means.
    async fn vehicle_by_id(&self, id: i64) -> Result<Option<Vehicle>, StoreError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
}

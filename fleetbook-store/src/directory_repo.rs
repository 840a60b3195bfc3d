use async_trait::async_trait;
use fleetbook_core::{StoreError, User, UserDirectory, Vehicle, VehicleDirectory};
use fleetbook_shared::Masked;
use rust_decimal::Decimal;
use sqlx::PgPool;

/// Read-only view over the vehicle service's `vehicles` table.
pub struct PgVehicleDirectory {
    pool: PgPool,
}

impl PgVehicleDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct VehicleRow {
    id: i64,
    host_id: i64,
    make: String,
    model: String,
    rate_per_hour: Decimal,
    overdue_fee_rate_per_hour: Decimal,
    cancellation_allowed: bool,
    is_deleted: bool,
}

impl From<VehicleRow> for Vehicle {
    fn from(row: VehicleRow) -> Self {
        Vehicle {
            id: row.id,
            host_id: row.host_id,
            make: row.make,
            model: row.model,
            rate_per_hour: row.rate_per_hour,
            overdue_fee_rate_per_hour: row.overdue_fee_rate_per_hour,
            cancellation_allowed: row.cancellation_allowed,
            is_deleted: row.is_deleted,
        }
    }
}

#[async_trait]
impl VehicleDirectory for PgVehicleDirectory {
    async fn vehicle_by_id(&self, id: i64) -> Result<Option<Vehicle>, StoreError> {
        let row = sqlx::query_as::<_, VehicleRow>(
            r#"
            SELECT id, host_id, make, model, rate_per_hour, overdue_fee_rate_per_hour,
                   cancellation_allowed, is_deleted
            FROM vehicles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(row.map(Vehicle::from))
    }
}

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        Ok(row.map(|r| User {
            id: r.id,
            name: r.name,
            email: Masked(r.email),
        }))
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetbook_core::repository::active_statuses;
use fleetbook_core::{
    Booking, BookingStatus, BookingStore, BookingTransaction, Invoice, OtpPurpose, OtpToken, PageRequest,
    StatusChange, StoreError, TimeWindow,
};
use fleetbook_shared::Masked;
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    vehicle_id: i64,
    host_id: i64,
    seeker_id: i64,
    status: String,
    pickup_location: String,
    dropoff_location: String,
    booking_amount: Decimal,
    overdue_fee_rate_per_hour: Decimal,
    actual_pickup_time: Option<DateTime<Utc>>,
    actual_dropoff_time: Option<DateTime<Utc>>,
    scheduled_pickup_time: DateTime<Utc>,
    scheduled_dropoff_time: DateTime<Utc>,
    cancellation_allowed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OtpRow {
    id: Uuid,
    booking_id: Uuid,
    purpose: String,
    otp: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    booking_id: Uuid,
    booking_amount: Decimal,
    additional_fees: Decimal,
    tax: Decimal,
    tax_rate: Decimal,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<BookingStatus>()
            .map_err(|reason| StoreError::CorruptRow { table: "bookings", reason })?;

        Ok(Booking {
            id: row.id,
            vehicle_id: row.vehicle_id,
            host_id: row.host_id,
            seeker_id: row.seeker_id,
            status,
            pickup_location: row.pickup_location,
            dropoff_location: row.dropoff_location,
            booking_amount: row.booking_amount,
            overdue_fee_rate_per_hour: row.overdue_fee_rate_per_hour,
            actual_pickup_time: row.actual_pickup_time,
            actual_dropoff_time: row.actual_dropoff_time,
            scheduled_pickup_time: row.scheduled_pickup_time,
            scheduled_dropoff_time: row.scheduled_dropoff_time,
            cancellation_allowed: row.cancellation_allowed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<OtpRow> for OtpToken {
    type Error = StoreError;

    fn try_from(row: OtpRow) -> Result<Self, Self::Error> {
        let purpose = row
            .purpose
            .parse::<OtpPurpose>()
            .map_err(|reason| StoreError::CorruptRow { table: "otp_tokens", reason })?;

        Ok(OtpToken {
            id: row.id,
            booking_id: row.booking_id,
            purpose,
            otp: Masked(row.otp),
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Invoice {
            id: row.id,
            booking_id: row.booking_id,
            booking_amount: row.booking_amount,
            additional_fees: row.additional_fees,
            tax: row.tax,
            tax_rate: row.tax_rate,
            total_amount: row.total_amount,
            created_at: row.created_at,
        }
    }
}

const SELECT_BOOKING: &str = r#"
    SELECT id, vehicle_id, host_id, seeker_id, status, pickup_location, dropoff_location,
           booking_amount, overdue_fee_rate_per_hour, actual_pickup_time, actual_dropoff_time,
           scheduled_pickup_time, scheduled_dropoff_time, cancellation_allowed, created_at, updated_at
    FROM bookings
"#;

async fn overlap_exists<'e, E>(executor: E, vehicle_id: i64, window: &TimeWindow) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let statuses = active_statuses();

    // Closed intervals: a shared boundary instant is a conflict
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM bookings
            WHERE vehicle_id = $1
              AND status = ANY($2)
              AND scheduled_pickup_time <= $4
              AND scheduled_dropoff_time >= $3
        )
        "#,
    )
    .bind(vehicle_id)
    .bind(&statuses[..])
    .bind(window.pickup)
    .bind(window.dropoff)
    .fetch_one(executor)
    .await
}

async fn conditional_update<'e, E>(executor: E, change: &StatusChange) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE bookings
        SET status = $1,
            actual_pickup_time = COALESCE($2, actual_pickup_time),
            actual_dropoff_time = COALESCE($3, actual_dropoff_time),
            updated_at = $4
        WHERE id = $5 AND status = $6
        "#,
    )
    .bind(change.to.as_str())
    .bind(change.actual_pickup_time)
    .bind(change.actual_dropoff_time)
    .bind(change.at)
    .bind(change.booking_id)
    .bind(change.from.as_str())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

impl PgBookingStore {
    async fn page_for(
        &self,
        column: &'static str,
        party_id: i64,
        page: PageRequest,
    ) -> Result<(Vec<Booking>, i64), StoreError> {
        let list_sql = format!(
            "{} WHERE {} = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            SELECT_BOOKING, column
        );
        let count_sql = format!("SELECT COUNT(*) FROM bookings WHERE {} = $1", column);

        let rows = sqlx::query_as::<_, BookingRow>(&list_sql)
            .bind(party_id)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(party_id)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        let bookings = rows.into_iter().map(Booking::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok((bookings, total))
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn begin(&self) -> Result<Box<dyn BookingTransaction>, StoreError> {
        let tx = self.pool.begin().await.map_err(StoreError::backend)?;
        Ok(Box::new(PgBookingTransaction { tx }))
    }

    async fn booking_by_id(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let sql = format!("{} WHERE id = $1", SELECT_BOOKING);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        row.map(Booking::try_from).transpose()
    }

    async fn has_overlap(&self, vehicle_id: i64, window: &TimeWindow) -> Result<bool, StoreError> {
        overlap_exists(&self.pool, vehicle_id, window)
            .await
            .map_err(StoreError::backend)
    }

    async fn active_token(&self, booking_id: Uuid, purpose: OtpPurpose) -> Result<Option<OtpToken>, StoreError> {
        let row = sqlx::query_as::<_, OtpRow>(
            r#"
            SELECT id, booking_id, purpose, otp, expires_at, created_at
            FROM otp_tokens
            WHERE booking_id = $1 AND purpose = $2
            "#,
        )
        .bind(booking_id)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(OtpToken::try_from).transpose()
    }

    async fn delete_token(&self, token_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM otp_tokens WHERE id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn update_status(&self, change: &StatusChange) -> Result<bool, StoreError> {
        conditional_update(&self.pool, change)
            .await
            .map_err(StoreError::backend)
    }

    async fn invoice_for_booking(&self, booking_id: Uuid) -> Result<Option<Invoice>, StoreError> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT id, booking_id, booking_amount, additional_fees, tax, tax_rate, total_amount, created_at
            FROM invoices
            WHERE booking_id = $1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(row.map(Invoice::from))
    }

    async fn bookings_for_seeker(&self, seeker_id: i64, page: PageRequest) -> Result<(Vec<Booking>, i64), StoreError> {
        self.page_for("seeker_id", seeker_id, page).await
    }

    async fn bookings_for_host(&self, host_id: i64, page: PageRequest) -> Result<(Vec<Booking>, i64), StoreError> {
        self.page_for("host_id", host_id, page).await
    }
}

pub struct PgBookingTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BookingTransaction for PgBookingTransaction {
    async fn reserve_if_free(&mut self, booking: &Booking) -> Result<bool, StoreError> {
        // Serializes concurrent reservations of the same vehicle until this transaction ends
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(booking.vehicle_id)
            .execute(&mut *self.tx)
            .await
            .map_err(StoreError::backend)?;

        if overlap_exists(&mut *self.tx, booking.vehicle_id, &booking.window())
            .await
            .map_err(StoreError::backend)?
        {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, vehicle_id, host_id, seeker_id, status, pickup_location, dropoff_location,
                booking_amount, overdue_fee_rate_per_hour, actual_pickup_time, actual_dropoff_time,
                scheduled_pickup_time, scheduled_dropoff_time, cancellation_allowed, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(booking.id)
        .bind(booking.vehicle_id)
        .bind(booking.host_id)
        .bind(booking.seeker_id)
        .bind(booking.status.as_str())
        .bind(&booking.pickup_location)
        .bind(&booking.dropoff_location)
        .bind(booking.booking_amount)
        .bind(booking.overdue_fee_rate_per_hour)
        .bind(booking.actual_pickup_time)
        .bind(booking.actual_dropoff_time)
        .bind(booking.scheduled_pickup_time)
        .bind(booking.scheduled_dropoff_time)
        .bind(booking.cancellation_allowed)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;

        Ok(true)
    }

    async fn put_token(&mut self, token: &OtpToken) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM otp_tokens WHERE booking_id = $1 AND purpose = $2")
            .bind(token.booking_id)
            .bind(token.purpose.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(StoreError::backend)?;

        sqlx::query(
            r#"
            INSERT INTO otp_tokens (id, booking_id, purpose, otp, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.id)
        .bind(token.booking_id)
        .bind(token.purpose.as_str())
        .bind(token.otp.expose())
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn apply_transition(&mut self, change: &StatusChange) -> Result<bool, StoreError> {
        conditional_update(&mut *self.tx, change)
            .await
            .map_err(StoreError::backend)
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO invoices (id, booking_id, booking_amount, additional_fees, tax, tax_rate, total_amount, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.booking_id)
        .bind(invoice.booking_amount)
        .bind(invoice.additional_fees)
        .bind(invoice.tax)
        .bind(invoice.tax_rate)
        .bind(invoice.total_amount)
        .bind(invoice.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgBookingTransaction { tx } = *self;
        tx.commit().await.map_err(StoreError::backend)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let PgBookingTransaction { tx } = *self;
        tx.rollback().await.map_err(StoreError::backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn booking_row(status: &str) -> BookingRow {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        BookingRow {
            id: Uuid::new_v4(),
            vehicle_id: 7,
            host_id: 1,
            seeker_id: 2,
            status: status.to_string(),
            pickup_location: "Depot A".to_string(),
            dropoff_location: "Depot B".to_string(),
            booking_amount: Decimal::new(4800, 0),
            overdue_fee_rate_per_hour: Decimal::new(150, 0),
            actual_pickup_time: None,
            actual_dropoff_time: None,
            scheduled_pickup_time: at,
            scheduled_dropoff_time: at,
            cancellation_allowed: true,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_booking_row_maps_status() {
        let booking = Booking::try_from(booking_row("CHECKED_OUT")).unwrap();
        assert_eq!(booking.status, BookingStatus::CheckedOut);
        assert_eq!(booking.vehicle_id, 7);
    }

    #[test]
    fn test_booking_row_rejects_unknown_status() {
        let err = Booking::try_from(booking_row("PAID")).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRow { table: "bookings", .. }));
    }

    #[test]
    fn test_otp_row_maps_purpose() {
        let row = OtpRow {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            purpose: "RETURN".to_string(),
            otp: "123456".to_string(),
            expires_at: Utc::now(),
            created_at: Utc::now(),
        };
        let token = OtpToken::try_from(row).unwrap();
        assert_eq!(token.purpose, OtpPurpose::Return);
        assert_eq!(token.otp.expose(), "123456");
    }
}

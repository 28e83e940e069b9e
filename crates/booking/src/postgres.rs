use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::db::Result;
use common::{BookingId, Money, PersistenceError};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::model::Booking;
use crate::state::{BookingStatus, Transition};
use crate::store::{BookingStore, StatusUpdate};

const COLUMNS: &str =
    "id, user_id, resource_id, total_amount_cents, status, created_at, updated_at";

/// PostgreSQL-backed booking store.
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Creates a new store on an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the booking migrations.
    ///
    /// The payment service may share the database and its own migration
    /// history, so versions this crate does not know are ignored.
    pub async fn run_migrations(&self) -> Result<()> {
        let mut migrator = sqlx::migrate!("../../migrations/bookings");
        migrator.set_ignore_missing(true);
        migrator.run(&self.pool).await?;
        Ok(())
    }

    fn row_to_booking(row: PgRow) -> Result<Booking> {
        let status: String = row.try_get("status")?;
        Ok(Booking {
            id: BookingId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: row.try_get("user_id")?,
            resource_id: row.try_get("resource_id")?,
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
            status: status.parse().map_err(PersistenceError::Corrupt)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn create(&self, booking: &Booking) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, resource_id, total_amount_cents, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(booking.id.as_uuid())
        .bind(&booking.user_id)
        .bind(&booking.resource_id)
        .bind(booking.total_amount.cents())
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM bookings WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_booking).transpose()
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_pending_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM bookings WHERE status = $1 AND created_at < $2 ORDER BY created_at ASC, id ASC"
        ))
        .bind(BookingStatus::Pending.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn update_status(&self, id: BookingId, transition: Transition) -> Result<StatusUpdate> {
        let updated = sqlx::query(&format!(
            r#"
            UPDATE bookings SET status = $3, updated_at = GREATEST($4, created_at)
            WHERE id = $1 AND status = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(transition.from().as_str())
        .bind(transition.to().as_str())
        .bind(common::db::now())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(StatusUpdate::Applied(Self::row_to_booking(row)?));
        }

        Ok(match self.get_by_id(id).await? {
            Some(current) => StatusUpdate::Unchanged(current),
            None => StatusUpdate::Missing,
        })
    }
}

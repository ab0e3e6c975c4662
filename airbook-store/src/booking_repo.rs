use airbook_core::repository::ReservationStore;
use airbook_core::{Booking, BookingStatus, NewBooking, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};

const BOOKING_COLUMNS: &str =
    "id, flight_id, seat_number, token, status, expires_at, email, created_at, updated_at";

pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn flight_exists(conn: &mut sqlx::PgConnection, flight_id: i64) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM flights WHERE id = $1)")
            .bind(flight_id)
            .fetch_one(conn)
            .await
            .map_err(backend)
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    flight_id: i64,
    seat_number: i32,
    token: String,
    status: String,
    expires_at: DateTime<Utc>,
    email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<BookingStatus>()
            .map_err(|e| StoreError::Backend(Box::new(e)))?;

        Ok(Booking {
            id: row.id,
            flight_id: row.flight_id,
            seat_number: row.seat_number,
            token: row.token,
            status,
            expires_at: row.expires_at,
            email: row.email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(err))
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn reserve_seat_and_insert(&self, booking: &NewBooking) -> StoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE flights
            SET available_seats = available_seats - 1, updated_at = NOW()
            WHERE id = $1 AND available_seats > 0
            RETURNING available_seats
            "#,
        )
        .bind(booking.flight_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let Some(remaining) = remaining else {
            // Nothing decremented; tell a sold-out flight apart from a missing one.
            return if Self::flight_exists(&mut *tx, booking.flight_id).await? {
                Err(StoreError::NoSeatsAvailable(booking.flight_id))
            } else {
                Err(StoreError::FlightNotFound(booking.flight_id))
            };
        };

        let row: BookingRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO bookings (flight_id, seat_number, token, status, expires_at, email)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking.flight_id)
        .bind(booking.seat_number)
        .bind(&booking.token)
        .bind(BookingStatus::Pending.as_str())
        .bind(booking.expires_at)
        .bind(&booking.email)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;

        debug!("Flight {} has {} seats left", booking.flight_id, remaining);
        row.try_into()
    }

    async fn get_by_token(&self, token: &str) -> StoreResult<Booking> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {} FROM bookings WHERE token = $1", BOOKING_COLUMNS))
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;

        row.ok_or_else(|| StoreError::BookingNotFound(token.to_string()))?
            .try_into()
    }

    async fn update_status(
        &self,
        token: &str,
        expected: &[BookingStatus],
        status: BookingStatus,
    ) -> StoreResult<Booking> {
        let expected: Vec<String> = expected.iter().map(|s| s.as_str().to_string()).collect();

        let row: Option<BookingRow> = sqlx::query_as(&format!(
            r#"
            UPDATE bookings SET status = $1, updated_at = NOW()
            WHERE token = $2 AND status = ANY($3)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(status.as_str())
        .bind(token)
        .bind(expected)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => row.try_into(),
            None => {
                // Either the token is unknown or somebody else moved the row first.
                let current = self.get_by_token(token).await?;
                Err(StoreError::StatusConflict {
                    token: token.to_string(),
                    current: current.status,
                })
            }
        }
    }

    async fn bulk_expire(&self, deadline: DateTime<Utc>) -> StoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            r#"
            UPDATE bookings SET status = $1, updated_at = NOW()
            WHERE status = $2 AND expires_at <= $3
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(BookingStatus::Expired.as_str())
        .bind(BookingStatus::Pending.as_str())
        .bind(deadline)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        if !rows.is_empty() {
            info!("Expired {} pending bookings with deadline {}", rows.len(), deadline);
        }

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn release_seat(&self, flight_id: i64) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE flights SET available_seats = available_seats + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(flight_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::FlightNotFound(flight_id));
        }
        Ok(())
    }

    async fn purge_cancelled(&self, flight_id: i64, keep_token: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM bookings WHERE flight_id = $1 AND status = $2 AND token <> $3")
            .bind(flight_id)
            .bind(BookingStatus::Cancelled.as_str())
            .bind(keep_token)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(result.rows_affected())
    }
}

use airbook_core::repository::FlightRepository;
use airbook_core::{Flight, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::booking_repo::backend;

const FLIGHT_COLUMNS: &str = "id, from_airport, to_airport, departure_time, arrival_time, \
     total_seats, available_seats, price_cents, created_at, updated_at";

pub struct PgFlightRepository {
    pub pool: sqlx::PgPool,
}

impl PgFlightRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: i64,
    from_airport: String,
    to_airport: String,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    total_seats: i32,
    available_seats: i32,
    price_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FlightRow> for Flight {
    fn from(row: FlightRow) -> Self {
        Flight {
            id: row.id,
            from_airport: row.from_airport,
            to_airport: row.to_airport,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            total_seats: row.total_seats,
            available_seats: row.available_seats,
            price_cents: row.price_cents,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl FlightRepository for PgFlightRepository {
    async fn list_flights(&self) -> StoreResult<Vec<Flight>> {
        let rows: Vec<FlightRow> = sqlx::query_as(&format!(
            "SELECT {} FROM flights ORDER BY departure_time",
            FLIGHT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(Flight::from).collect())
    }

    async fn get_flight(&self, id: i64) -> StoreResult<Flight> {
        let row: Option<FlightRow> =
            sqlx::query_as(&format!("SELECT {} FROM flights WHERE id = $1", FLIGHT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;

        row.map(Flight::from).ok_or(StoreError::FlightNotFound(id))
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::{LockError, PublishError, StoreResult};
use crate::models::{Booking, BookingStatus, Flight, NewBooking};

/// Transactional storage for flights' seat counts and booking rows.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Decrements `available_seats` if positive and inserts a PENDING row, in one transaction.
    async fn reserve_seat_and_insert(&self, booking: &NewBooking) -> StoreResult<Booking>;

    async fn get_by_token(&self, token: &str) -> StoreResult<Booking>;

    /// Single conditional write: succeeds only if the row's current status is in `expected`.
    async fn update_status(
        &self,
        token: &str,
        expected: &[BookingStatus],
        status: BookingStatus,
    ) -> StoreResult<Booking>;

    /// Moves every PENDING row with `expires_at <= deadline` to EXPIRED and returns them.
    async fn bulk_expire(&self, deadline: DateTime<Utc>) -> StoreResult<Vec<Booking>>;

    /// Unconditionally increments `available_seats`.
    async fn release_seat(&self, flight_id: i64) -> StoreResult<()>;

    /// Deletes the flight's CANCELLED rows other than `keep_token`. Returns how many went away.
    async fn purge_cancelled(&self, flight_id: i64, keep_token: &str) -> StoreResult<u64>;
}

/// Read access to the flight catalog.
#[async_trait]
pub trait FlightRepository: Send + Sync {
    async fn list_flights(&self) -> StoreResult<Vec<Flight>>;

    async fn get_flight(&self, id: i64) -> StoreResult<Flight>;
}

/// Advisory, TTL-bound exclusion per (flight, seat).
#[async_trait]
pub trait SeatLockCoordinator: Send + Sync {
    /// Returns `Ok(false)` when the seat is already held.
    async fn acquire(&self, flight_id: i64, seat_number: i32, ttl: Duration) -> Result<bool, LockError>;

    /// Releasing a lock that is not held is not an error.
    async fn release(&self, flight_id: i64, seat_number: i32) -> Result<(), LockError>;
}

/// Best-effort, synchronous delivery to a named channel.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, key: &str, payload: &str) -> Result<(), PublishError>;
}

/// Short-lived cache of the flight list.
#[async_trait]
pub trait FlightCache: Send + Sync {
    async fn get_flights(&self) -> Result<Option<Vec<Flight>>, crate::error::BoxError>;

    async fn set_flights(&self, flights: &[Flight]) -> Result<(), crate::error::BoxError>;
}

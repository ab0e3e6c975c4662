//! In-process implementations of every collaborator trait.
//!
//! They keep the same contracts as the Postgres, Redis and Kafka adapters
//! (conditional decrement, conditional status write, TTL-bound locks) and can
//! be told to fail, so the engine can be exercised without external services.

use airbook_core::repository::{EventPublisher, FlightCache, FlightRepository, ReservationStore, SeatLockCoordinator};
use airbook_core::{
    Booking, BookingStatus, BoxError, Flight, LockError, NewBooking, PublishError, StoreError, StoreResult,
};
use airbook_shared::BookingEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

fn injected(what: &str) -> BoxError {
    format!("injected {} failure", what).into()
}

#[derive(Default)]
struct StoreState {
    flights: HashMap<i64, Flight>,
    bookings: HashMap<String, Booking>,
    next_flight_id: i64,
    next_booking_id: i64,
}

/// Flights and bookings held behind a single async mutex; every trait call is one critical section.
#[derive(Default)]
pub struct InMemoryReservationStore {
    state: Mutex<StoreState>,
    failing: AtomicBool,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a flight and returns its id.
    pub async fn add_flight(&self, from: &str, to: &str, total_seats: i32, available_seats: i32) -> i64 {
        let mut state = self.state.lock().await;
        state.next_flight_id += 1;
        let id = state.next_flight_id;
        let now = Utc::now();

        state.flights.insert(
            id,
            Flight {
                id,
                from_airport: from.to_string(),
                to_airport: to.to_string(),
                departure_time: now + chrono::Duration::days(7),
                arrival_time: now + chrono::Duration::days(7) + chrono::Duration::hours(3),
                total_seats,
                available_seats,
                price_cents: 19_900,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub async fn flight(&self, id: i64) -> Option<Flight> {
        self.state.lock().await.flights.get(&id).cloned()
    }

    pub async fn available_seats(&self, id: i64) -> Option<i32> {
        self.flight(id).await.map(|f| f.available_seats)
    }

    /// Inserts a row as-is, bypassing the seat count. For seeding history in tests.
    pub async fn seed_booking(
        &self,
        flight_id: i64,
        seat_number: i32,
        status: BookingStatus,
        expires_at: DateTime<Utc>,
    ) -> Booking {
        let email = format!("seat{}@example.com", seat_number);
        let new = NewBooking::pending(flight_id, seat_number, &email, expires_at);

        let mut state = self.state.lock().await;
        Self::insert_row(&mut state, &new, status)
    }

    pub async fn booking_count(&self) -> usize {
        self.state.lock().await.bookings.len()
    }

    /// When set, every trait call fails with a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self, op: &str) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(injected(op)));
        }
        Ok(())
    }

    fn insert_row(state: &mut StoreState, new: &NewBooking, status: BookingStatus) -> Booking {
        state.next_booking_id += 1;
        let now = Utc::now();
        let booking = Booking {
            id: state.next_booking_id,
            flight_id: new.flight_id,
            seat_number: new.seat_number,
            token: new.token.clone(),
            status,
            expires_at: new.expires_at,
            email: new.email.clone(),
            created_at: now,
            updated_at: now,
        };
        state.bookings.insert(booking.token.clone(), booking.clone());
        booking
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn reserve_seat_and_insert(&self, booking: &NewBooking) -> StoreResult<Booking> {
        self.check("reserve")?;
        let mut state = self.state.lock().await;

        let flight = state
            .flights
            .get_mut(&booking.flight_id)
            .ok_or(StoreError::FlightNotFound(booking.flight_id))?;
        if flight.available_seats <= 0 {
            return Err(StoreError::NoSeatsAvailable(booking.flight_id));
        }
        flight.available_seats -= 1;
        flight.updated_at = Utc::now();

        Ok(Self::insert_row(&mut state, booking, BookingStatus::Pending))
    }

    async fn get_by_token(&self, token: &str) -> StoreResult<Booking> {
        self.check("lookup")?;
        self.state
            .lock()
            .await
            .bookings
            .get(token)
            .cloned()
            .ok_or_else(|| StoreError::BookingNotFound(token.to_string()))
    }

    async fn update_status(
        &self,
        token: &str,
        expected: &[BookingStatus],
        status: BookingStatus,
    ) -> StoreResult<Booking> {
        self.check("update")?;
        let mut state = self.state.lock().await;

        let booking = state
            .bookings
            .get_mut(token)
            .ok_or_else(|| StoreError::BookingNotFound(token.to_string()))?;
        if !expected.contains(&booking.status) || !booking.status.can_transition_to(status) {
            return Err(StoreError::StatusConflict {
                token: token.to_string(),
                current: booking.status,
            });
        }

        booking.status = status;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn bulk_expire(&self, deadline: DateTime<Utc>) -> StoreResult<Vec<Booking>> {
        self.check("bulk expire")?;
        let mut state = self.state.lock().await;
        let now = Utc::now();

        let mut expired: Vec<Booking> = state
            .bookings
            .values_mut()
            .filter(|b| b.status == BookingStatus::Pending && b.expires_at <= deadline)
            .map(|b| {
                b.status = BookingStatus::Expired;
                b.updated_at = now;
                b.clone()
            })
            .collect();
        expired.sort_by_key(|b| b.id);
        Ok(expired)
    }

    async fn release_seat(&self, flight_id: i64) -> StoreResult<()> {
        self.check("release seat")?;
        let mut state = self.state.lock().await;

        let flight = state
            .flights
            .get_mut(&flight_id)
            .ok_or(StoreError::FlightNotFound(flight_id))?;
        if flight.available_seats >= flight.total_seats {
            // Postgres rejects this through the bounds CHECK constraint.
            return Err(StoreError::Backend(
                format!("available_seats would exceed total_seats on flight {}", flight_id).into(),
            ));
        }
        flight.available_seats += 1;
        flight.updated_at = Utc::now();
        Ok(())
    }

    async fn purge_cancelled(&self, flight_id: i64, keep_token: &str) -> StoreResult<u64> {
        self.check("purge")?;
        let mut state = self.state.lock().await;
        let before = state.bookings.len();
        state
            .bookings
            .retain(|token, b| {
                token == keep_token || b.flight_id != flight_id || b.status != BookingStatus::Cancelled
            });
        Ok((before - state.bookings.len()) as u64)
    }
}

#[async_trait]
impl FlightRepository for InMemoryReservationStore {
    async fn list_flights(&self) -> StoreResult<Vec<Flight>> {
        self.check("list flights")?;
        let mut flights: Vec<Flight> = self.state.lock().await.flights.values().cloned().collect();
        flights.sort_by_key(|f| f.departure_time);
        Ok(flights)
    }

    async fn get_flight(&self, id: i64) -> StoreResult<Flight> {
        self.check("get flight")?;
        self.flight(id).await.ok_or(StoreError::FlightNotFound(id))
    }
}

/// TTL-bound seat locks keyed by (flight, seat). Uses tokio's clock, so paused-time tests can expire them.
#[derive(Default)]
pub struct InMemorySeatLocks {
    locks: Mutex<HashMap<(i64, i32), Instant>>,
    acquisitions: AtomicUsize,
    releases: AtomicUsize,
    failing: AtomicBool,
}

impl InMemorySeatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_held(&self, flight_id: i64, seat_number: i32) -> bool {
        self.locks
            .lock()
            .await
            .get(&(flight_id, seat_number))
            .is_some_and(|deadline| *deadline > Instant::now())
    }

    /// Entries currently in the map, lapsed or not.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Successful acquisitions so far.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Release calls so far, held or not.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SeatLockCoordinator for InMemorySeatLocks {
    async fn acquire(&self, flight_id: i64, seat_number: i32, ttl: Duration) -> Result<bool, LockError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LockError(injected("lock")));
        }

        let mut locks = self.locks.lock().await;
        let now = Instant::now();
        locks.retain(|_, deadline| *deadline > now);
        match locks.get(&(flight_id, seat_number)) {
            Some(deadline) if *deadline > now => Ok(false),
            _ => {
                locks.insert((flight_id, seat_number), now + ttl);
                self.acquisitions.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
        }
    }

    async fn release(&self, flight_id: i64, seat_number: i32) -> Result<(), LockError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(LockError(injected("unlock")));
        }
        self.locks.lock().await.remove(&(flight_id, seat_number));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub channel: String,
    pub key: String,
    pub payload: String,
}

/// Records every message it is asked to deliver.
#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
    failing: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().await.clone()
    }

    /// Decoded events sent to `channel`, in publish order.
    pub async fn events_on(&self, channel: &str) -> Vec<BookingEvent> {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|m| m.channel == channel)
            .filter_map(|m| serde_json::from_str(&m.payload).ok())
            .collect()
    }

    /// When set, every publish fails and nothing is recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, channel: &str, key: &str, payload: &str) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Delivery {
                channel: channel.to_string(),
                source: injected("publish"),
            });
        }

        self.messages.lock().await.push(PublishedMessage {
            channel: channel.to_string(),
            key: key.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}

/// Flight-list cache without expiry.
#[derive(Default)]
pub struct InMemoryFlightCache {
    flights: Mutex<Option<Vec<Flight>>>,
    failing: AtomicBool,
}

impl InMemoryFlightCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_populated(&self) -> bool {
        self.flights.lock().await.is_some()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl FlightCache for InMemoryFlightCache {
    async fn get_flights(&self) -> Result<Option<Vec<Flight>>, BoxError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(injected("cache read"));
        }
        Ok(self.flights.lock().await.clone())
    }

    async fn set_flights(&self, flights: &[Flight]) -> Result<(), BoxError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(injected("cache write"));
        }
        *self.flights.lock().await = Some(flights.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reserve_stops_at_zero() {
        let store = InMemoryReservationStore::new();
        let flight_id = store.add_flight("SVO", "LED", 2, 1).await;
        let expires = Utc::now() + chrono::Duration::minutes(15);

        store
            .reserve_seat_and_insert(&NewBooking::pending(flight_id, 1, "a@x.com", expires))
            .await
            .unwrap();
        let err = store
            .reserve_seat_and_insert(&NewBooking::pending(flight_id, 2, "b@x.com", expires))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::NoSeatsAvailable(id) if id == flight_id));
        assert_eq!(store.available_seats(flight_id).await, Some(0));
        assert_eq!(store.booking_count().await, 1);
    }

    #[tokio::test]
    async fn test_conditional_status_write() {
        let store = InMemoryReservationStore::new();
        let flight_id = store.add_flight("SVO", "LED", 10, 10).await;
        let booking = store
            .seed_booking(flight_id, 3, BookingStatus::Confirmed, Utc::now())
            .await;

        let err = store
            .update_status(&booking.token, &[BookingStatus::Pending], BookingStatus::Expired)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StatusConflict { current: BookingStatus::Confirmed, .. }));

        let err = store
            .update_status("missing", &[BookingStatus::Pending], BookingStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BookingNotFound(_)));
    }

    #[tokio::test]
    async fn test_release_seat_unknown_flight() {
        let store = InMemoryReservationStore::new();
        assert!(matches!(
            store.release_seat(99).await,
            Err(StoreError::FlightNotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_purge_only_touches_cancelled_rows_of_flight() {
        let store = InMemoryReservationStore::new();
        let f1 = store.add_flight("SVO", "LED", 10, 10).await;
        let f2 = store.add_flight("LED", "SVO", 10, 10).await;
        let now = Utc::now();

        let kept = store.seed_booking(f1, 1, BookingStatus::Cancelled, now).await;
        store.seed_booking(f1, 2, BookingStatus::Cancelled, now).await;
        store.seed_booking(f1, 4, BookingStatus::Cancelled, now).await;
        store.seed_booking(f1, 3, BookingStatus::Confirmed, now).await;
        store.seed_booking(f2, 1, BookingStatus::Cancelled, now).await;

        assert_eq!(store.purge_cancelled(f1, &kept.token).await.unwrap(), 2);
        assert_eq!(store.booking_count().await, 3);
        assert!(store.get_by_token(&kept.token).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_seat_lock_expires_after_ttl() {
        let locks = InMemorySeatLocks::new();

        assert!(locks.acquire(1, 5, Duration::from_secs(60)).await.unwrap());
        assert!(!locks.acquire(1, 5, Duration::from_secs(60)).await.unwrap());
        assert!(locks.acquire(1, 6, Duration::from_secs(60)).await.unwrap());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!locks.is_held(1, 5).await);
        assert!(locks.acquire(1, 5, Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lapsed_locks_are_pruned_on_acquire() {
        let locks = InMemorySeatLocks::new();

        for seat in 1..=3 {
            assert!(locks.acquire(1, seat, Duration::from_secs(10)).await.unwrap());
        }
        assert!(locks.acquire(2, 1, Duration::from_secs(60)).await.unwrap());
        assert_eq!(locks.tracked().await, 4);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(locks.acquire(3, 1, Duration::from_secs(60)).await.unwrap());

        assert_eq!(locks.tracked().await, 2);
        assert!(locks.is_held(2, 1).await);
    }

    #[tokio::test]
    async fn test_release_of_unheld_lock_is_ok() {
        let locks = InMemorySeatLocks::new();
        locks.release(1, 1).await.unwrap();
        assert_eq!(locks.releases(), 1);
    }
}

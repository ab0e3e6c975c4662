use airbook_core::repository::{FlightCache, SeatLockCoordinator};
use airbook_core::{BoxError, Flight, LockError};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

const FLIGHTS_KEY: &str = "cache:flights";

pub fn seat_lock_key(flight_id: i64, seat_number: i32) -> String {
    format!("lock:flight:{}:seat:{}", flight_id, seat_number)
}

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    flights_ttl: Duration,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            flights_ttl: Duration::from_secs(60),
        })
    }

    pub fn with_flights_ttl(mut self, ttl: Duration) -> Self {
        self.flights_ttl = ttl;
        self
    }

    pub async fn acquire_seat_lock(&self, flight_id: i64, seat_number: i32, ttl: Duration) -> Result<bool, redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = seat_lock_key(flight_id, seat_number);

        // Nil reply means another holder still owns the seat.
        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("locked")
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await?;

        debug!("Seat lock {} acquired: {}", key, result.is_some());
        Ok(result.is_some())
    }

    pub async fn release_seat_lock(&self, flight_id: i64, seat_number: i32) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = seat_lock_key(flight_id, seat_number);
        let removed: i64 = conn.del(&key).await?;
        debug!("Seat lock {} released (held: {})", key, removed > 0);
        Ok(())
    }

    pub async fn get_cached_flights(&self) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.get(FLIGHTS_KEY).await
    }

    pub async fn set_cached_flights(&self, payload: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(FLIGHTS_KEY, payload, self.flights_ttl.as_secs().max(1)).await
    }
}

#[async_trait]
impl SeatLockCoordinator for RedisClient {
    async fn acquire(&self, flight_id: i64, seat_number: i32, ttl: Duration) -> Result<bool, LockError> {
        self.acquire_seat_lock(flight_id, seat_number, ttl)
            .await
            .map_err(|e| LockError(Box::new(e)))
    }

    async fn release(&self, flight_id: i64, seat_number: i32) -> Result<(), LockError> {
        self.release_seat_lock(flight_id, seat_number)
            .await
            .map_err(|e| LockError(Box::new(e)))
    }
}

#[async_trait]
impl FlightCache for RedisClient {
    async fn get_flights(&self) -> Result<Option<Vec<Flight>>, BoxError> {
        match self.get_cached_flights().await? {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn set_flights(&self, flights: &[Flight]) -> Result<(), BoxError> {
        let payload = serde_json::to_string(flights)?;
        self.set_cached_flights(&payload).await?;
        Ok(())
    }
}

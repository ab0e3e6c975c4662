use airbook_core::repository::{FlightCache, FlightRepository};
use airbook_core::{BookingResult, Flight};
use std::sync::Arc;
use tracing::{debug, warn};

/// Read side of the flight inventory, with an optional cache in front of the list.
pub struct FlightCatalog {
    flights: Arc<dyn FlightRepository>,
    cache: Option<Arc<dyn FlightCache>>,
}

impl FlightCatalog {
    pub fn new(flights: Arc<dyn FlightRepository>) -> Self {
        Self { flights, cache: None }
    }

    pub fn with_cache(mut self, cache: Arc<dyn FlightCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Cache-aside listing. A cache error counts as a miss; repopulation is best effort.
    pub async fn list(&self) -> BookingResult<Vec<Flight>> {
        if let Some(cache) = &self.cache {
            match cache.get_flights().await {
                Ok(Some(flights)) => {
                    debug!("Flight list served from cache ({} flights)", flights.len());
                    return Ok(flights);
                }
                Ok(None) => debug!("Flight list cache miss"),
                Err(e) => warn!("Flight cache read failed: {}", e),
            }
        }

        let flights = self.flights.list_flights().await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set_flights(&flights).await {
                warn!("Failed to repopulate flight cache: {}", e);
            }
        }
        Ok(flights)
    }

    pub async fn get(&self, id: i64) -> BookingResult<Flight> {
        Ok(self.flights.get_flight(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airbook_core::BookingError;
    use airbook_store::memory::{InMemoryFlightCache, InMemoryReservationStore};

    #[tokio::test]
    async fn test_list_populates_cache_then_serves_from_it() {
        let store = Arc::new(InMemoryReservationStore::new());
        let cache = Arc::new(InMemoryFlightCache::new());
        store.add_flight("SVO", "LED", 100, 100).await;
        let catalog = FlightCatalog::new(store.clone()).with_cache(cache.clone());

        let first = catalog.list().await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(cache.is_populated().await);

        // A flight added after caching stays invisible until the cache entry goes away.
        store.add_flight("LED", "KZN", 50, 50).await;
        let second = catalog.list().await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_cache_failure_falls_back_to_repository() {
        let store = Arc::new(InMemoryReservationStore::new());
        let cache = Arc::new(InMemoryFlightCache::new());
        store.add_flight("SVO", "LED", 100, 100).await;
        cache.set_failing(true);
        let catalog = FlightCatalog::new(store).with_cache(cache.clone());

        let flights = catalog.list().await.unwrap();
        assert_eq!(flights.len(), 1);
        assert!(!cache.is_populated().await);
    }

    #[tokio::test]
    async fn test_list_without_cache() {
        let store = Arc::new(InMemoryReservationStore::new());
        store.add_flight("SVO", "LED", 100, 100).await;
        store.add_flight("LED", "KZN", 50, 50).await;

        let flights = FlightCatalog::new(store).list().await.unwrap();
        assert_eq!(flights.len(), 2);
    }

    #[tokio::test]
    async fn test_get_unknown_flight() {
        let store = Arc::new(InMemoryReservationStore::new());
        let catalog = FlightCatalog::new(store);

        let err = catalog.get(7).await.unwrap_err();
        assert!(matches!(err, BookingError::FlightNotFound(7)));
    }

    #[tokio::test]
    async fn test_get_reads_live_counts() {
        let store = Arc::new(InMemoryReservationStore::new());
        let cache = Arc::new(InMemoryFlightCache::new());
        let id = store.add_flight("SVO", "LED", 100, 42).await;
        let catalog = FlightCatalog::new(store).with_cache(cache);

        catalog.list().await.unwrap();
        let flight = catalog.get(id).await.unwrap();
        assert_eq!(flight.available_seats, 42);
        assert_eq!(flight.from_airport, "SVO");
    }
}

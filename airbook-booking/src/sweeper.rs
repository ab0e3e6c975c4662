use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::engine::ReservationEngine;

/// Periodically expires stale PENDING bookings through the engine.
pub struct ExpirationSweeper {
    engine: Arc<ReservationEngine>,
    interval: Duration,
}

impl ExpirationSweeper {
    pub fn new(engine: Arc<ReservationEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One sweep. Failures are logged and the next tick tries again.
    pub async fn tick(&self) -> usize {
        match self.engine.expire_pending_bookings().await {
            Ok(expired) if expired.is_empty() => {
                debug!("Expiration sweep found nothing to expire");
                0
            }
            Ok(expired) => {
                info!("Expiration sweep expired {} bookings", expired.len());
                expired.len()
            }
            Err(e) => {
                error!("Expiration sweep failed: {}", e);
                0
            }
        }
    }

    /// Sweeps every `interval` until `shutdown` resolves. A sweep in progress is finished first.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // first tick completes immediately

        info!("Expiration sweeper started, interval {:?}", self.interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        info!("Expiration sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airbook_core::{BookingSettings, BookingStatus};
    use airbook_store::memory::InMemoryReservationStore;
    use chrono::Utc;
    use tokio::sync::oneshot;

    fn engine(store: Arc<InMemoryReservationStore>) -> Arc<ReservationEngine> {
        let settings = BookingSettings::new(Duration::from_secs(900), Duration::from_secs(1800), "booking-events");
        Arc::new(ReservationEngine::new(store, settings))
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let store = Arc::new(InMemoryReservationStore::new());
        let sweeper = ExpirationSweeper::new(engine(store), Duration::ZERO);
        assert_eq!(sweeper.interval(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_tick_reports_expired_count() {
        let store = Arc::new(InMemoryReservationStore::new());
        let flight_id = store.add_flight("SVO", "LED", 10, 5).await;
        let past = Utc::now() - chrono::Duration::minutes(1);
        store.seed_booking(flight_id, 1, BookingStatus::Pending, past).await;
        store.seed_booking(flight_id, 2, BookingStatus::Pending, past).await;

        let sweeper = ExpirationSweeper::new(engine(store.clone()), Duration::from_secs(60));

        assert_eq!(sweeper.tick().await, 2);
        assert_eq!(sweeper.tick().await, 0);
    }

    #[tokio::test]
    async fn test_tick_survives_store_failure() {
        let store = Arc::new(InMemoryReservationStore::new());
        store.set_failing(true);
        let sweeper = ExpirationSweeper::new(engine(store), Duration::from_secs(60));

        assert_eq!(sweeper.tick().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sweeps_until_shutdown() {
        let store = Arc::new(InMemoryReservationStore::new());
        let flight_id = store.add_flight("SVO", "LED", 10, 5).await;
        let stale = store
            .seed_booking(flight_id, 1, BookingStatus::Pending, Utc::now() - chrono::Duration::minutes(1))
            .await;
        let engine = engine(store.clone());
        let sweeper = ExpirationSweeper::new(engine.clone(), Duration::from_secs(30));

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            sweeper
                .run(async {
                    let _ = stop_rx.await;
                })
                .await;
        });

        tokio::time::sleep(Duration::from_secs(31)).await;
        let booking = engine.get_booking(&stale.token).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Expired);

        stop_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_returns_on_immediate_shutdown() {
        let store = Arc::new(InMemoryReservationStore::new());
        let sweeper = ExpirationSweeper::new(engine(store), Duration::from_secs(3600));

        sweeper.run(std::future::ready(())).await;
    }
}

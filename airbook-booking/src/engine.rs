use airbook_core::repository::{EventPublisher, ReservationStore, SeatLockCoordinator};
use airbook_core::{
    Booking, BookingError, BookingResult, BookingSettings, BookingStatus, NewBooking, PublishError, StoreError,
};
use airbook_shared::{BookingEvent, BookingEventKind, Masked};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::metrics::ReservationMetrics;

/// Booking state machine on top of a store, an optional seat-lock coordinator
/// and an optional event publisher.
///
/// Operations return the full [`Booking`] row; transports hand it out as a
/// [`airbook_core::BookingSummary`] via `BookingSummary::from(&booking)`.
///
/// Every collaborator is injected at construction; the engine keeps no other state
/// and can be shared across tasks behind an `Arc`.
pub struct ReservationEngine {
    store: Arc<dyn ReservationStore>,
    locks: Option<Arc<dyn SeatLockCoordinator>>,
    publisher: Option<Arc<dyn EventPublisher>>,
    metrics: Option<Arc<ReservationMetrics>>,
    settings: BookingSettings,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn ReservationStore>, settings: BookingSettings) -> Self {
        Self {
            store,
            locks: None,
            publisher: None,
            metrics: None,
            settings,
        }
    }

    pub fn with_seat_locks(mut self, locks: Arc<dyn SeatLockCoordinator>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ReservationMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &BookingSettings {
        &self.settings
    }

    /// Holds `seat_number` on `flight_id` and inserts a PENDING booking.
    ///
    /// The seat lock (if a coordinator is configured) is taken before the store
    /// transaction and released again if the transaction fails.
    pub async fn create_booking(&self, flight_id: i64, seat_number: i32, email: &str) -> BookingResult<Booking> {
        if seat_number <= 0 {
            return Err(BookingError::Validation("seat number must be positive".to_string()));
        }
        if email.trim().is_empty() {
            return Err(BookingError::Validation("email is required".to_string()));
        }
        let expires_at = chrono::Duration::from_std(self.settings.pending_ttl())
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| BookingError::Validation("confirmation window is out of range".to_string()))?;

        let mut locked = false;
        if let Some(locks) = &self.locks {
            if !locks.acquire(flight_id, seat_number, self.settings.hold_ttl).await? {
                info!("Seat {} on flight {} is already locked", seat_number, flight_id);
                return Err(BookingError::SeatLocked { flight_id, seat_number });
            }
            locked = true;
        }

        let request = NewBooking::pending(flight_id, seat_number, email, expires_at);
        let booking = match self.store.reserve_seat_and_insert(&request).await {
            Ok(booking) => booking,
            Err(err) => {
                if locked {
                    self.release_lock(flight_id, seat_number).await;
                }
                warn!("Failed to reserve seat {} on flight {}: {}", seat_number, flight_id, err);
                return Err(err.into());
            }
        };

        info!(
            "Booking {} created: flight {} seat {} for {}, expires at {}",
            booking.token,
            booking.flight_id,
            booking.seat_number,
            Masked(&booking.email),
            booking.expires_at
        );
        self.record_transition("created");
        self.emit(BookingEventKind::BookingCreated, &booking).await;

        Ok(booking)
    }

    /// PENDING → CONFIRMED. The seat stays counted as sold; only the lock is let go.
    pub async fn confirm_booking(&self, token: &str) -> BookingResult<Booking> {
        let current = self.store.get_by_token(token).await?;
        if current.status != BookingStatus::Pending {
            return Err(BookingError::NotPending {
                token: token.to_string(),
                status: current.status,
            });
        }

        // A concurrent sweep or cancel surfaces here as NotPending.
        let updated = self
            .store
            .update_status(token, &[BookingStatus::Pending], BookingStatus::Confirmed)
            .await?;

        info!("Booking {} confirmed", updated.token);
        self.record_transition("confirmed");
        self.release_lock(updated.flight_id, updated.seat_number).await;
        self.emit(BookingEventKind::BookingConfirmed, &updated).await;

        Ok(updated)
    }

    /// PENDING or CONFIRMED → CANCELLED, returning the seat to the flight.
    ///
    /// Cancelling a booking that is already CANCELLED or EXPIRED returns it unchanged.
    pub async fn cancel_booking(&self, token: &str) -> BookingResult<Booking> {
        let current = self.store.get_by_token(token).await?;
        if current.status.is_terminal() {
            debug!("Booking {} already {}, nothing to cancel", token, current.status);
            return Ok(current);
        }

        let updated = match self
            .store
            .update_status(
                token,
                &[BookingStatus::Pending, BookingStatus::Confirmed],
                BookingStatus::Cancelled,
            )
            .await
        {
            Ok(updated) => updated,
            Err(StoreError::StatusConflict { .. }) => {
                // Lost the race to another cancel or to the sweep; both leave a terminal row.
                let latest = self.store.get_by_token(token).await?;
                if latest.status.is_terminal() {
                    return Ok(latest);
                }
                return Err(BookingError::NotPending {
                    token: token.to_string(),
                    status: latest.status,
                });
            }
            Err(err) => return Err(err.into()),
        };

        info!("Booking {} cancelled (was {})", updated.token, current.status);
        self.record_transition("cancelled");
        self.release_seat(updated.flight_id).await;
        if self.settings.purge_cancelled_on_release {
            self.purge_cancelled(updated.flight_id, &updated.token).await;
        }
        self.release_lock(updated.flight_id, updated.seat_number).await;
        self.emit(BookingEventKind::BookingCancelled, &updated).await;

        Ok(updated)
    }

    /// Sweeps against the current wall clock.
    pub async fn expire_pending_bookings(&self) -> BookingResult<Vec<Booking>> {
        self.expire_pending_bookings_at(Utc::now()).await
    }

    /// Expires every PENDING booking whose deadline is at or before `now`.
    ///
    /// Only the bulk update can fail the call; per-row cleanup failures are
    /// logged and counted, and the remaining rows are still processed.
    pub async fn expire_pending_bookings_at(&self, now: DateTime<Utc>) -> BookingResult<Vec<Booking>> {
        let expired = self.store.bulk_expire(now).await?;

        for booking in &expired {
            debug!("Booking {} expired at {}", booking.token, booking.expires_at);
            self.record_transition("expired");
            self.release_seat(booking.flight_id).await;
            self.release_lock(booking.flight_id, booking.seat_number).await;
            self.emit(BookingEventKind::BookingExpired, booking).await;
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_expired(expired.len());
        }
        Ok(expired)
    }

    pub async fn get_booking(&self, token: &str) -> BookingResult<Booking> {
        Ok(self.store.get_by_token(token).await?)
    }

    async fn release_seat(&self, flight_id: i64) {
        if let Err(err) = self.store.release_seat(flight_id).await {
            warn!("Failed to return seat to flight {}: {}", flight_id, err);
            self.record_cleanup_failure("release_seat");
        }
    }

    async fn purge_cancelled(&self, flight_id: i64, keep_token: &str) {
        match self.store.purge_cancelled(flight_id, keep_token).await {
            Ok(0) => {}
            Ok(purged) => info!("Purged {} cancelled bookings on flight {}", purged, flight_id),
            Err(err) => {
                warn!("Failed to purge cancelled bookings on flight {}: {}", flight_id, err);
                self.record_cleanup_failure("purge_cancelled");
            }
        }
    }

    async fn release_lock(&self, flight_id: i64, seat_number: i32) {
        let Some(locks) = &self.locks else { return };
        if let Err(err) = locks.release(flight_id, seat_number).await {
            warn!("Failed to release lock for seat {} on flight {}: {}", seat_number, flight_id, err);
            self.record_cleanup_failure("release_lock");
        }
    }

    /// Post-commit hook. The transition is already durable, so nothing here fails the caller.
    async fn emit(&self, kind: BookingEventKind, booking: &Booking) {
        let Some(publisher) = &self.publisher else { return };
        if self.settings.booking_topic.is_empty() {
            return;
        }

        let event = BookingEvent {
            kind,
            token: booking.token.clone(),
            flight_id: booking.flight_id,
            seat_number: booking.seat_number,
            email: booking.email.clone(),
            status: booking.status.as_str().to_string(),
            expires_at: booking.expires_at,
        };
        let payload = match event.to_payload().map_err(PublishError::from) {
            Ok(payload) => payload,
            Err(err) => {
                self.publish_failed(kind, &booking.token, &err);
                return;
            }
        };

        let channels = std::iter::once(self.settings.booking_topic.as_str())
            .chain(self.settings.notifications_topic.as_deref());
        for channel in channels {
            if let Err(err) = publisher.publish(channel, &booking.token, &payload).await {
                self.publish_failed(kind, &booking.token, &err);
            }
        }
    }

    fn publish_failed(&self, kind: BookingEventKind, token: &str, err: &PublishError) {
        warn!("Failed to publish {} event for booking {}: {}", kind, token, err);
        self.record_publish_failure(kind);
    }

    fn record_transition(&self, transition: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_transition(transition);
        }
    }

    fn record_cleanup_failure(&self, step: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cleanup_failure(step);
        }
    }

    fn record_publish_failure(&self, kind: BookingEventKind) {
        if let Some(metrics) = &self.metrics {
            metrics.record_publish_failure(kind.as_str());
        }
    }
}

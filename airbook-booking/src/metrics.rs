use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters for the reservation engine, registered on their own [`Registry`].
///
/// This is where failures the engine deliberately swallows (event delivery,
/// per-row cleanup after a durable transition) become visible.
pub struct ReservationMetrics {
    registry: Registry,
    transitions: IntCounterVec,
    publish_failures: IntCounterVec,
    cleanup_failures: IntCounterVec,
    expired: IntCounter,
}

impl ReservationMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let transitions = IntCounterVec::new(
            Opts::new("airbook_booking_transitions_total", "Booking state transitions"),
            &["transition"],
        )?;
        let publish_failures = IntCounterVec::new(
            Opts::new("airbook_event_publish_failures_total", "Booking events that could not be delivered"),
            &["event"],
        )?;
        let cleanup_failures = IntCounterVec::new(
            Opts::new("airbook_cleanup_failures_total", "Post-transition cleanup steps that failed"),
            &["step"],
        )?;
        let expired = IntCounter::new("airbook_expired_bookings_total", "Bookings expired by the sweep")?;

        registry.register(Box::new(transitions.clone()))?;
        registry.register(Box::new(publish_failures.clone()))?;
        registry.register(Box::new(cleanup_failures.clone()))?;
        registry.register(Box::new(expired.clone()))?;

        Ok(Self {
            registry,
            transitions,
            publish_failures,
            cleanup_failures,
            expired,
        })
    }

    pub fn record_transition(&self, transition: &str) {
        self.transitions.with_label_values(&[transition]).inc();
    }

    pub fn record_publish_failure(&self, event: &str) {
        self.publish_failures.with_label_values(&[event]).inc();
    }

    pub fn record_cleanup_failure(&self, step: &str) {
        self.cleanup_failures.with_label_values(&[step]).inc();
    }

    pub fn record_expired(&self, count: usize) {
        self.expired.inc_by(count as u64);
    }

    pub fn transitions(&self, transition: &str) -> u64 {
        self.transitions.with_label_values(&[transition]).get()
    }

    pub fn publish_failures(&self, event: &str) -> u64 {
        self.publish_failures.with_label_values(&[event]).get()
    }

    pub fn cleanup_failures(&self, step: &str) -> u64 {
        self.cleanup_failures.with_label_values(&[step]).get()
    }

    pub fn expired(&self) -> u64 {
        self.expired.get()
    }

    /// Text exposition format, ready to serve on a scrape endpoint.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

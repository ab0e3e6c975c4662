use std::time::Duration;

/// Knobs the reservation engine reads on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingSettings {
    /// Seat-lock TTL.
    pub hold_ttl: Duration,
    /// How long a PENDING booking lives. Zero falls back to `hold_ttl`.
    pub confirmation_ttl: Duration,
    /// Primary event channel. Empty disables publication.
    pub booking_topic: String,
    pub notifications_topic: Option<String>,
    pub purge_cancelled_on_release: bool,
}

impl BookingSettings {
    pub fn new(hold_ttl: Duration, confirmation_ttl: Duration, booking_topic: impl Into<String>) -> Self {
        Self {
            hold_ttl,
            confirmation_ttl,
            booking_topic: booking_topic.into(),
            notifications_topic: None,
            purge_cancelled_on_release: false,
        }
    }

    pub fn with_notifications_topic(mut self, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        self.notifications_topic = if topic.is_empty() { None } else { Some(topic) };
        self
    }

    pub fn with_purge_cancelled_on_release(mut self, enabled: bool) -> Self {
        self.purge_cancelled_on_release = enabled;
        self
    }

    /// Lifetime of a new PENDING booking.
    pub fn pending_ttl(&self) -> Duration {
        if self.confirmation_ttl.is_zero() {
            self.hold_ttl
        } else {
            self.confirmation_ttl
        }
    }
}

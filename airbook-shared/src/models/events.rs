use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State change that produced a [`BookingEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    BookingCreated,
    BookingConfirmed,
    BookingCancelled,
    BookingExpired,
}

impl BookingEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingEventKind::BookingCreated => "booking_created",
            BookingEventKind::BookingConfirmed => "booking_confirmed",
            BookingEventKind::BookingCancelled => "booking_cancelled",
            BookingEventKind::BookingExpired => "booking_expired",
        }
    }
}

impl fmt::Display for BookingEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload published on the booking channel (and the notification channel, if any).
/// Keyed by `token` on the wire.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingEvent {
    #[serde(rename = "type")]
    pub kind: BookingEventKind,
    pub token: String,
    pub flight_id: i64,
    pub seat_number: i32,
    pub email: String,
    pub status: String,
    pub expires_at: DateTime<Utc>,
}

impl BookingEvent {
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

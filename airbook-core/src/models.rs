use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A scheduled flight and its seat-count aggregate.
///
/// `available_seats` only says how many seats are unsold, never which ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flight {
    pub id: i64,
    pub from_airport: String,
    pub to_airport: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub total_seats: i32,
    pub available_seats: i32,
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking lifecycle.
///
/// PENDING is the only initial state; CANCELLED and EXPIRED are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Expired => "EXPIRED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Expired)
    }

    /// Whether a status update from `self` to `next` is a legal edge.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Pending, BookingStatus::Expired)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown booking status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for BookingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "EXPIRED" => Ok(BookingStatus::Expired),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A persisted seat reservation. Looked up by `token`, never deleted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: i64,
    pub flight_id: i64,
    pub seat_number: i32,
    pub token: String,
    pub status: BookingStatus,
    pub expires_at: DateTime<Utc>,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for the store's reserve-and-insert transaction.
///
/// Identity and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub flight_id: i64,
    pub seat_number: i32,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub email: String,
}

impl NewBooking {
    /// Builds a pending booking request with a fresh random token.
    pub fn pending(flight_id: i64, seat_number: i32, email: &str, expires_at: DateTime<Utc>) -> Self {
        Self {
            flight_id,
            seat_number,
            token: Uuid::new_v4().to_string(),
            expires_at,
            email: email.to_string(),
        }
    }
}

/// The shape handed back to transports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingSummary {
    pub token: String,
    pub status: BookingStatus,
    pub expires_at: DateTime<Utc>,
    pub flight_id: i64,
    pub seat_number: i32,
    pub email: String,
}

impl From<&Booking> for BookingSummary {
    fn from(booking: &Booking) -> Self {
        Self {
            token: booking.token.clone(),
            status: booking.status,
            expires_at: booking.expires_at,
            flight_id: booking.flight_id,
            seat_number: booking.seat_number,
            email: booking.email.clone(),
        }
    }
}

use crate::models::BookingStatus;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures reported by a [`crate::repository::ReservationStore`] or
/// [`crate::repository::FlightRepository`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No seats available on flight {0}")]
    NoSeatsAvailable(i64),

    #[error("Flight not found: {0}")]
    FlightNotFound(i64),

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    /// The conditional status write found the row in a state it did not expect.
    #[error("Booking {token} is already {current}")]
    StatusConflict { token: String, current: BookingStatus },

    #[error("Store backend error: {0}")]
    Backend(#[source] BoxError),
}

#[derive(Debug, thiserror::Error)]
#[error("Seat lock backend error: {0}")]
pub struct LockError(#[source] pub BoxError);

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to deliver event to {channel}: {source}")]
    Delivery {
        channel: String,
        #[source]
        source: BoxError,
    },
}

/// Coarse error classes, as seen by a transport mapping status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Collaborator,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Seat {seat_number} on flight {flight_id} is already locked")]
    SeatLocked { flight_id: i64, seat_number: i32 },

    #[error("No seats available on flight {0}")]
    NoSeatsAvailable(i64),

    #[error("Booking {token} is not pending (status {status})")]
    NotPending { token: String, status: BookingStatus },

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    #[error("Flight not found: {0}")]
    FlightNotFound(i64),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::Validation(_) => ErrorKind::Validation,
            BookingError::SeatLocked { .. }
            | BookingError::NoSeatsAvailable(_)
            | BookingError::NotPending { .. } => ErrorKind::Conflict,
            BookingError::BookingNotFound(_) | BookingError::FlightNotFound(_) => ErrorKind::NotFound,
            BookingError::Store(_) | BookingError::Lock(_) => ErrorKind::Collaborator,
        }
    }
}

/// Domain-meaningful store failures become engine variants; everything else stays wrapped.
impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NoSeatsAvailable(flight_id) => BookingError::NoSeatsAvailable(flight_id),
            StoreError::FlightNotFound(flight_id) => BookingError::FlightNotFound(flight_id),
            StoreError::BookingNotFound(token) => BookingError::BookingNotFound(token),
            StoreError::StatusConflict { token, current } => BookingError::NotPending { token, status: current },
            other => BookingError::Store(other),
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
pub type StoreResult<T> = Result<T, StoreError>;

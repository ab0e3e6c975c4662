pub mod error;
pub mod models;
pub mod repository;
pub mod settings;

pub use error::{BookingError, BookingResult, BoxError, ErrorKind, LockError, PublishError, StoreError, StoreResult};
pub use models::{Booking, BookingStatus, BookingSummary, Flight, NewBooking};
pub use repository::{EventPublisher, FlightCache, FlightRepository, ReservationStore, SeatLockCoordinator};
pub use settings::BookingSettings;

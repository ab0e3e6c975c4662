pub mod catalog;
pub mod engine;
pub mod metrics;
pub mod sweeper;

pub use catalog::FlightCatalog;
pub use engine::ReservationEngine;
pub use metrics::ReservationMetrics;
pub use sweeper::ExpirationSweeper;

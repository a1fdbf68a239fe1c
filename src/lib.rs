//! Slot-scheduling and collision-resolution engine for clinical calendars.

pub mod blocked;
pub mod calendar;
pub mod collision;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod grid;
pub mod models;
pub mod optimistic;
pub mod schedule;
pub mod search;
pub mod simulation;
pub mod store;

pub use calendar::DayCalendar;
pub use config::EngineConfig;
pub use controller::{BookingRequest, CalendarController, PendingWrite};
pub use error::{Result, SchedulingError};
pub use grid::TimeSlotGrid;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `fallback_filter`.
pub fn init_tracing(fallback_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_filter)),
        )
        .try_init();
}

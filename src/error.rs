//! Error types for the scheduling engine.
//!
//! Time parsing errors are recovered locally by the engine; the remaining
//! variants abort a single user action and are surfaced to the caller.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("Invalid time format: '{input}' (expected HH:MM)")]
    InvalidTimeFormat { input: String },

    #[error("Invalid schedule record for practitioner {practitioner}: {reason}")]
    InvalidScheduleRecord {
        practitioner: String,
        reason: String,
    },

    #[error("Invalid range: {start} to {end}")]
    InvalidRange { start: String, end: String },

    #[error("Missing booking context: {field}")]
    MissingContext { field: &'static str },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Real record {0} cannot be deleted inside a simulation")]
    ReadOnlyInSimulation(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Column {0} is not bookable on this day")]
    UnknownColumn(String),

    #[error("Slot {slot} in column {column} is already taken")]
    SlotOccupied { column: String, slot: i64 },

    #[error("Slot {slot} lies outside the day")]
    SlotOutOfGrid { slot: i64 },

    #[error("Write to {0} was superseded by a newer change")]
    Superseded(String),

    #[error("No drag in progress")]
    NoActiveDrag,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SchedulingError>;

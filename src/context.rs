//! Resolution of booking context from several candidate sources.
//!
//! A simulated context overrides the selected calendar, which overrides the
//! record being edited. The first source that carries a value wins.

use crate::error::{Result, SchedulingError};
use crate::models::ResourceRefs;

/// Return the first present candidate, or `MissingContext` naming `field`.
pub fn resolve_first<T, I>(field: &'static str, candidates: I) -> Result<T>
where
    I: IntoIterator<Item = Option<T>>,
{
    candidates
        .into_iter()
        .flatten()
        .next()
        .ok_or(SchedulingError::MissingContext { field })
}

/// Context a simulation runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedContext {
    pub simulation_id: String,
    pub location_id: Option<String>,
    pub practice_id: Option<String>,
    pub appointment_type_id: Option<String>,
}

impl SimulatedContext {
    pub fn new(simulation_id: impl Into<String>) -> Self {
        SimulatedContext {
            simulation_id: simulation_id.into(),
            ..SimulatedContext::default()
        }
    }
}

/// Identifiers every write to the store needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingContext {
    pub location_id: String,
    pub practice_id: String,
    pub appointment_type_id: String,
}

/// Candidate sources for a booking context, highest precedence first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextSources<'a> {
    pub simulated: Option<&'a SimulatedContext>,
    pub selected: Option<&'a ResourceRefs>,
    pub record: Option<&'a ResourceRefs>,
}

impl<'a> ContextSources<'a> {
    /// Resolve every booking field, simulated values first.
    ///
    /// Fails on the first field no source provides.
    pub fn resolve(&self) -> Result<BookingContext> {
        let location_id = resolve_first(
            "location",
            [
                self.simulated.and_then(|s| s.location_id.clone()),
                self.selected.and_then(|r| r.location_id.clone()),
                self.record.and_then(|r| r.location_id.clone()),
            ],
        )?;
        let practice_id = resolve_first(
            "practice",
            [
                self.simulated.and_then(|s| s.practice_id.clone()),
                self.selected.and_then(|r| r.practice_id.clone()),
                self.record.and_then(|r| r.practice_id.clone()),
            ],
        )?;
        let appointment_type_id = resolve_first(
            "appointment type",
            [
                self.simulated.and_then(|s| s.appointment_type_id.clone()),
                self.selected.and_then(|r| r.appointment_type_id.clone()),
                self.record.and_then(|r| r.appointment_type_id.clone()),
            ],
        )?;

        Ok(BookingContext {
            location_id,
            practice_id,
            appointment_type_id,
        })
    }

    /// Location only, for manual blocks which carry no practice or type.
    pub fn resolve_location(&self) -> Result<String> {
        resolve_first(
            "location",
            [
                self.simulated.and_then(|s| s.location_id.clone()),
                self.selected.and_then(|r| r.location_id.clone()),
                self.record.and_then(|r| r.location_id.clone()),
            ],
        )
    }
}

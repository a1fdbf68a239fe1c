//! Real-versus-simulated targeting of writes.
//!
//! Outside a simulation every write hits the real record. Inside one, edits
//! to a real record fork it into a simulation-owned copy that supersedes the
//! original in the simulated view; later edits to the original are redirected
//! to the fork.

use std::collections::HashMap;
use uuid::Uuid;

use crate::context::{ContextSources, SimulatedContext};
use crate::error::{Result, SchedulingError};
use crate::models::{AppointmentRecord, CalendarRecord, ManualBlockRecord, RecordPatch, ResourceRefs};
use crate::store::Collection;

/// Where a write against an existing record lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    Real,
    Simulation,
    Fork,
}

/// Where a write to `record` has to go given the active simulation.
pub fn write_target<R: CalendarRecord>(record: &R, simulated: Option<&SimulatedContext>) -> WriteTarget {
    match (simulated, record.is_simulation()) {
        (None, _) => WriteTarget::Real,
        (Some(_), true) => WriteTarget::Simulation,
        (Some(_), false) => WriteTarget::Fork,
    }
}

/// Records visible in the real or the simulated view.
///
/// The real view hides simulation records. The simulated view hides real
/// records that a simulation record supersedes.
pub fn active_view<R: CalendarRecord>(records: &[R], simulated: bool) -> Vec<R> {
    if !simulated {
        return records.iter().filter(|r| !r.is_simulation()).cloned().collect();
    }
    let superseded: Vec<&str> = records
        .iter()
        .filter(|r| r.is_simulation())
        .filter_map(|r| r.replaces())
        .collect();
    records
        .iter()
        .filter(|r| r.is_simulation() || !superseded.contains(&r.id()))
        .cloned()
        .collect()
}

/// Records that must be bound to booking context before they are written.
pub trait ContextBound: CalendarRecord {
    fn bind_context(&mut self, sources: &ContextSources<'_>) -> Result<()>;

    /// Context the record already carries, as the lowest-precedence source.
    fn context_refs(&self) -> ResourceRefs;
}

impl ContextBound for AppointmentRecord {
    fn context_refs(&self) -> ResourceRefs {
        self.refs.clone()
    }

    fn bind_context(&mut self, sources: &ContextSources<'_>) -> Result<()> {
        let context = sources.resolve()?;
        self.refs.location_id = Some(context.location_id);
        self.refs.practice_id = Some(context.practice_id);
        self.refs.appointment_type_id = Some(context.appointment_type_id);
        Ok(())
    }
}

impl ContextBound for ManualBlockRecord {
    fn context_refs(&self) -> ResourceRefs {
        ResourceRefs {
            location_id: self.location_id.clone(),
            ..ResourceRefs::default()
        }
    }

    fn bind_context(&mut self, sources: &ContextSources<'_>) -> Result<()> {
        self.location_id = Some(sources.resolve_location()?);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Id the write actually landed on.
    pub id: String,
    pub forked_from: Option<String>,
}

#[derive(Debug, Default)]
pub struct SimulationProjector {
    simulated: Option<SimulatedContext>,
    redirects: HashMap<String, String>,
}

impl SimulationProjector {
    pub fn new() -> Self {
        SimulationProjector::default()
    }

    pub fn enter(&mut self, context: SimulatedContext) {
        tracing::info!(simulation = %context.simulation_id, "Entering simulation");
        self.simulated = Some(context);
        self.redirects.clear();
    }

    pub fn leave(&mut self) {
        if let Some(context) = self.simulated.take() {
            tracing::info!(simulation = %context.simulation_id, "Leaving simulation");
        }
        self.redirects.clear();
    }

    pub fn simulated(&self) -> Option<&SimulatedContext> {
        self.simulated.as_ref()
    }

    pub fn is_simulating(&self) -> bool {
        self.simulated.is_some()
    }

    /// Follow a fork redirect, if any.
    pub fn resolve_id<'a>(&'a self, id: &'a str) -> &'a str {
        self.redirects.get(id).map(String::as_str).unwrap_or(id)
    }

    /// Seed redirects from records already forked in an earlier session.
    pub fn learn_forks<R: CalendarRecord>(&mut self, records: &[R]) {
        if !self.is_simulating() {
            return;
        }
        for record in records.iter().filter(|r| r.is_simulation()) {
            if let Some(original) = record.replaces() {
                self.redirects
                    .entry(original.to_string())
                    .or_insert_with(|| record.id().to_string());
            }
        }
    }

    /// Create a record, owned by the simulation when one is active.
    pub fn create<R, S>(
        &mut self,
        store: &mut S,
        mut record: R,
        sources: &ContextSources<'_>,
    ) -> Result<WriteOutcome>
    where
        R: ContextBound,
        S: Collection<R>,
    {
        record.bind_context(sources)?;
        if self.is_simulating() {
            record.mark_simulation();
        }
        let id = store.create(record)?;
        Ok(WriteOutcome {
            id,
            forked_from: None,
        })
    }

    /// Update a record, forking it first when a simulation edits real data.
    pub fn update<R, S>(
        &mut self,
        store: &mut S,
        id: &str,
        patch: &RecordPatch,
        sources: &ContextSources<'_>,
    ) -> Result<WriteOutcome>
    where
        R: ContextBound,
        S: Collection<R>,
    {
        let target_id = self.resolve_id(id).to_string();
        let record = store
            .get(&target_id)
            .ok_or_else(|| SchedulingError::RecordNotFound(target_id.clone()))?;

        if patch.is_empty() {
            return Ok(WriteOutcome {
                id: target_id,
                forked_from: None,
            });
        }

        match write_target(&record, self.simulated.as_ref()) {
            WriteTarget::Real | WriteTarget::Simulation => {
                store.update(&target_id, patch)?;
                Ok(WriteOutcome {
                    id: target_id,
                    forked_from: None,
                })
            }
            WriteTarget::Fork => self.fork(store, &record, patch, sources),
        }
    }

    /// Delete a record. Real records are read-only inside a simulation.
    pub fn delete<R, S>(&mut self, store: &mut S, id: &str) -> Result<WriteOutcome>
    where
        R: CalendarRecord,
        S: Collection<R>,
    {
        let target_id = self.resolve_id(id).to_string();
        let record = store
            .get(&target_id)
            .ok_or_else(|| SchedulingError::RecordNotFound(target_id.clone()))?;

        if write_target(&record, self.simulated.as_ref()) == WriteTarget::Fork {
            return Err(SchedulingError::ReadOnlyInSimulation(target_id));
        }

        store.delete(&target_id)?;
        // the original shows up again in the simulated view
        self.redirects.retain(|_, fork| *fork != target_id);
        Ok(WriteOutcome {
            id: target_id,
            forked_from: None,
        })
    }

    fn fork<R, S>(
        &mut self,
        store: &mut S,
        original: &R,
        patch: &RecordPatch,
        sources: &ContextSources<'_>,
    ) -> Result<WriteOutcome>
    where
        R: ContextBound,
        S: Collection<R>,
    {
        let mut forked = original.fork(Uuid::new_v4().to_string(), patch);
        forked.bind_context(sources)?;

        let fork_id = store.create(forked)?;
        tracing::info!(original = %original.id(), fork = %fork_id, "Forked record into simulation");
        self.redirects
            .insert(original.id().to_string(), fork_id.clone());

        Ok(WriteOutcome {
            id: fork_id,
            forked_from: Some(original.id().to_string()),
        })
    }
}

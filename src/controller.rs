//! Session controller turning UI commands into engine calls and writes.
//!
//! The controller owns the mutable session state (selected day and location,
//! simulation, current drag) and a [`DayCalendar`] rebuilt after every write.
//! Every write is staged first: the change is applied to an optimistic
//! overlay and shown at once. Completing it writes through the
//! [`SimulationProjector`] and confirms or reverts the overlay. Only the
//! newest staged change per record may complete.

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::calendar::DayCalendar;
use crate::config::EngineConfig;
use crate::context::{resolve_first, ContextSources, SimulatedContext};
use crate::error::{Result, SchedulingError};
use crate::models::{
    AppointmentRecord, ManualBlockRecord, RecordPatch, ResourceRef, ResourceRefs,
};
use crate::optimistic::OptimisticLedger;
use crate::schedule::ScheduleDeriver;
use crate::simulation::{ContextBound, SimulationProjector, WriteOutcome};
use crate::store::{Collection, DayQuery, RecordStore};

/// The appointment currently being dragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragState {
    pub appointment_id: String,
    pub origin_column: ResourceRef,
    pub origin_slot: i64,
    pub duration_minutes: i64,
}

/// Where a drop landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub column: ResourceRef,
    pub slot: i64,
    /// Search found no free placement and the drop landed on a taken slot.
    pub collides: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropOutcome {
    pub write: WriteOutcome,
    pub column: ResourceRef,
    pub slot: i64,
    /// Search found no free placement and the drop landed on a taken slot.
    pub collides: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeOutcome {
    pub write: WriteOutcome,
    pub duration_minutes: i64,
}

/// A grid-click booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub column: ResourceRef,
    pub slot: i64,
    pub duration_minutes: i64,
    pub title: String,
    pub patient_id: Option<String>,
}

#[derive(Debug, Default)]
struct Overlays {
    appointments: OptimisticLedger<AppointmentRecord>,
    blocks: OptimisticLedger<ManualBlockRecord>,
}

#[derive(Debug, Clone)]
enum WriteOp<R> {
    Create(R),
    Update(RecordPatch),
    Delete,
}

#[derive(Debug, Clone)]
enum StagedOp {
    Appointment(WriteOp<AppointmentRecord>),
    Block(WriteOp<ManualBlockRecord>),
}

/// A change already shown in the calendar whose store write is outstanding.
///
/// Pass it to [`CalendarController::complete`].
#[derive(Debug, Clone)]
pub struct PendingWrite {
    id: String,
    version: u64,
    record_refs: Option<ResourceRefs>,
    op: StagedOp,
}

impl PendingWrite {
    /// Record the change applies to.
    pub fn id(&self) -> &str {
        &self.id
    }
}

trait Overlaid: ContextBound {
    fn ledger(overlays: &mut Overlays) -> &mut OptimisticLedger<Self>;
    fn staged(op: WriteOp<Self>) -> StagedOp;
}

impl Overlaid for AppointmentRecord {
    fn ledger(overlays: &mut Overlays) -> &mut OptimisticLedger<Self> {
        &mut overlays.appointments
    }

    fn staged(op: WriteOp<Self>) -> StagedOp {
        StagedOp::Appointment(op)
    }
}

impl Overlaid for ManualBlockRecord {
    fn ledger(overlays: &mut Overlays) -> &mut OptimisticLedger<Self> {
        &mut overlays.blocks
    }

    fn staged(op: WriteOp<Self>) -> StagedOp {
        StagedOp::Block(op)
    }
}

pub struct CalendarController<S: RecordStore> {
    store: S,
    deriver: ScheduleDeriver,
    projector: SimulationProjector,
    overlays: Overlays,
    selected_date: NaiveDate,
    selection: ResourceRefs,
    drag: Option<DragState>,
    calendar: DayCalendar,
}

impl<S: RecordStore> CalendarController<S> {
    /// Open the calendar on `date` with the given location/practice selection.
    pub fn new(store: S, config: EngineConfig, date: NaiveDate, selection: ResourceRefs) -> Result<Self> {
        config.validate()?;
        let deriver = ScheduleDeriver::new(config);
        let calendar = DayCalendar::build(&deriver, date, &Default::default(), None, false);
        let mut controller = CalendarController {
            store,
            deriver,
            projector: SimulationProjector::new(),
            overlays: Overlays::default(),
            selected_date: date,
            selection,
            drag: None,
            calendar,
        };
        controller.refresh()?;
        Ok(controller)
    }

    pub fn calendar(&self) -> &DayCalendar {
        &self.calendar
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn drag(&self) -> Option<&DragState> {
        self.drag.as_ref()
    }

    pub fn is_simulating(&self) -> bool {
        self.projector.is_simulating()
    }

    /// Location in effect: the simulated one first, then the selected one.
    pub fn location(&self) -> Option<String> {
        resolve_first(
            "location",
            [
                self.projector.simulated().and_then(|s| s.location_id.clone()),
                self.selection.location_id.clone(),
            ],
        )
        .ok()
    }

    /// Reload the day from the store and rebuild the view.
    pub fn refresh(&mut self) -> Result<()> {
        let location = self.location();
        let mut snapshot = self.store.load_day(&DayQuery {
            date: self.selected_date,
            location_id: location.clone(),
        })?;

        self.projector.learn_forks(&snapshot.appointments);
        self.projector.learn_forks(&snapshot.manual_blocks);
        snapshot.appointments = self.overlays.appointments.project(&snapshot.appointments);
        snapshot.manual_blocks = self.overlays.blocks.project(&snapshot.manual_blocks);

        self.calendar = DayCalendar::build(
            &self.deriver,
            self.selected_date,
            &snapshot,
            location.as_deref(),
            self.projector.is_simulating(),
        );
        for warning in &self.calendar.schedule().warnings {
            tracing::debug!(%warning, "Schedule warning");
        }
        Ok(())
    }

    /// Switch to another day; any drag is dropped.
    pub fn select_day(&mut self, date: NaiveDate) -> Result<()> {
        self.selected_date = date;
        self.drag = None;
        self.refresh()
    }

    pub fn select_location(&mut self, location_id: Option<String>) -> Result<()> {
        self.selection.location_id = location_id;
        self.drag = None;
        self.refresh()
    }

    /// Start a what-if session. Writes from now on go to simulation records.
    pub fn enter_simulation(&mut self, context: SimulatedContext) -> Result<()> {
        self.projector.enter(context);
        self.drag = None;
        self.refresh()
    }

    /// Return to the real calendar. Simulation records stay in the store.
    pub fn leave_simulation(&mut self) -> Result<()> {
        self.projector.leave();
        self.drag = None;
        self.refresh()
    }

    /// Pick up an appointment, following a simulation fork if one exists.
    pub fn begin_drag(&mut self, appointment_id: &str) -> Result<&DragState> {
        let target = self.projector.resolve_id(appointment_id).to_string();
        let appointment = self
            .calendar
            .appointment(&target)
            .ok_or_else(|| SchedulingError::RecordNotFound(target.clone()))?;

        let drag = self.drag.insert(DragState {
            appointment_id: target,
            origin_column: appointment.column.clone(),
            origin_slot: appointment.start_slot,
            duration_minutes: appointment.duration_minutes,
        });
        Ok(&*drag)
    }

    pub fn cancel_drag(&mut self) -> Option<DragState> {
        self.drag.take()
    }

    /// Drop the dragged appointment at the free slot nearest to `slot`.
    pub fn drop_at(&mut self, column: ResourceRef, slot: i64) -> Result<DropOutcome> {
        let (placement, pending) = self.stage_drop(column, slot)?;
        let write = self.complete(pending)?;
        Ok(DropOutcome {
            write,
            column: placement.column,
            slot: placement.slot,
            collides: placement.collides,
        })
    }

    /// Show the drop in the calendar and return the write still to be made.
    pub fn stage_drop(&mut self, column: ResourceRef, slot: i64) -> Result<(Placement, PendingWrite)> {
        let drag = self.drag.take().ok_or(SchedulingError::NoActiveDrag)?;
        self.ensure_column(&column)?;

        let id = drag.appointment_id.as_str();
        let slot = self.calendar.nearest_free(&column, slot, drag.duration_minutes, Some(id));
        let collides = self
            .calendar
            .has_collision(&column, slot, drag.duration_minutes, Some(id));
        if collides {
            tracing::warn!(%column, slot, appointment = id, "No free slot left, dropping onto a taken slot");
        }

        let start = self.calendar.grid().at(self.selected_date, slot)?;
        let patch = RecordPatch {
            start: Some(start),
            end: Some(start + Duration::minutes(drag.duration_minutes)),
            column: Some(column.clone()),
            title: None,
        };
        let previous = self.current_appointment(id)?;
        let pending = self.stage_update(id, previous, &patch);

        Ok((
            Placement {
                column,
                slot,
                collides,
            },
            pending,
        ))
    }

    /// Change an appointment's length, keeping it within the free space
    /// after its start and at least one slot long.
    pub fn resize(&mut self, appointment_id: &str, duration_minutes: i64) -> Result<ResizeOutcome> {
        let (applied, pending) = self.stage_resize(appointment_id, duration_minutes)?;
        let write = self.complete(pending)?;
        Ok(ResizeOutcome {
            write,
            duration_minutes: applied,
        })
    }

    /// Show the resize in the calendar; returns the applied duration.
    pub fn stage_resize(&mut self, appointment_id: &str, duration_minutes: i64) -> Result<(i64, PendingWrite)> {
        let target = self.projector.resolve_id(appointment_id).to_string();
        let appointment = self
            .calendar
            .appointment(&target)
            .cloned()
            .ok_or_else(|| SchedulingError::RecordNotFound(target.clone()))?;

        let grid = *self.calendar.grid();
        let available = self.calendar.max_available_duration(
            &appointment.column,
            appointment.start_slot,
            Some(target.as_str()),
        );
        let applied = (grid.slots_for(duration_minutes) * grid.slot_duration_minutes)
            .min(available)
            .max(grid.slot_duration_minutes);

        let start = grid.at(self.selected_date, appointment.start_slot)?;
        let patch = RecordPatch {
            end: Some(start + Duration::minutes(applied)),
            ..RecordPatch::default()
        };
        let previous = self.current_appointment(&target)?;
        Ok((applied, self.stage_update(&target, previous, &patch)))
    }

    /// Book a new appointment at a clicked slot.
    pub fn book_at(&mut self, request: BookingRequest) -> Result<WriteOutcome> {
        self.ensure_column(&request.column)?;
        let grid = *self.calendar.grid();
        let available = self
            .calendar
            .max_available_duration(&request.column, request.slot, None);
        let duration = (grid.slots_for(request.duration_minutes) * grid.slot_duration_minutes)
            .min(available)
            .max(grid.slot_duration_minutes);

        let in_grid = request.slot >= 0
            && request.slot.saturating_add(grid.slots_for(duration)) <= grid.total_slots();
        if !in_grid || self.calendar.has_collision(&request.column, request.slot, duration, None) {
            return Err(SchedulingError::SlotOccupied {
                column: request.column.to_string(),
                slot: request.slot,
            });
        }

        let start = grid.at(self.selected_date, request.slot)?;
        let record = AppointmentRecord::new(
            Uuid::new_v4().to_string(),
            request.column.clone(),
            start,
            start + Duration::minutes(duration),
            request.title,
        )?
        .with_refs(ResourceRefs {
            patient_id: request.patient_id,
            practitioner_id: request.column.practitioner_id().map(str::to_string),
            ..ResourceRefs::default()
        });

        let id = record.id.clone();
        let pending = self.stage(&id, None, Some(record.clone()), WriteOp::Create(record));
        self.complete(pending)
    }

    pub fn delete_appointment(&mut self, appointment_id: &str) -> Result<WriteOutcome> {
        let target = self.projector.resolve_id(appointment_id).to_string();
        let previous = self.current_appointment(&target)?;
        let pending = self.stage(&target, Some(previous), None, WriteOp::Delete);
        self.complete(pending)
    }

    /// Create a manual block over `[start_slot, end_slot)`.
    pub fn block_range(
        &mut self,
        column: ResourceRef,
        start_slot: i64,
        end_slot: i64,
        title: impl Into<String>,
    ) -> Result<WriteOutcome> {
        self.ensure_column(&column)?;
        self.ensure_in_grid(start_slot, end_slot)?;
        let grid = *self.calendar.grid();

        let record = ManualBlockRecord {
            id: Uuid::new_v4().to_string(),
            column,
            start: grid.at(self.selected_date, start_slot)?,
            end: grid.at(self.selected_date, end_slot)?,
            title: title.into(),
            is_simulation: false,
            replaces_blocked_slot_id: None,
            location_id: None,
        };
        let id = record.id.clone();
        let pending = self.stage(&id, None, Some(record.clone()), WriteOp::Create(record));
        self.complete(pending)
    }

    /// Move a manual block, keeping its length.
    pub fn move_block(&mut self, block_id: &str, column: ResourceRef, start_slot: i64) -> Result<WriteOutcome> {
        self.ensure_column(&column)?;
        let target = self.projector.resolve_id(block_id).to_string();
        let previous = self.current_block(&target)?;

        let grid = *self.calendar.grid();
        let end_slot = start_slot.saturating_add(grid.slots_for(previous.duration_minutes()));
        self.ensure_in_grid(start_slot, end_slot)?;

        let start = grid.at(self.selected_date, start_slot)?;
        let patch = RecordPatch {
            start: Some(start),
            end: Some(start + Duration::minutes(previous.duration_minutes())),
            column: Some(column),
            title: None,
        };
        let pending = self.stage_update(&target, previous, &patch);
        self.complete(pending)
    }

    /// Delete a manual block.
    pub fn delete_block(&mut self, block_id: &str) -> Result<WriteOutcome> {
        let target = self.projector.resolve_id(block_id).to_string();
        let previous = self.current_block(&target)?;
        let pending = self.stage(&target, Some(previous), None, WriteOp::Delete);
        self.complete(pending)
    }

    /// Write a staged change to the store and settle it in the calendar.
    ///
    /// A change overtaken by a newer one on the same record is not written
    /// and fails with `Superseded`. A failed write reverts the local change.
    pub fn complete(&mut self, pending: PendingWrite) -> Result<WriteOutcome> {
        let PendingWrite {
            id,
            version,
            record_refs,
            op,
        } = pending;
        match op {
            StagedOp::Appointment(op) => self.settle::<AppointmentRecord>(&id, version, record_refs, op),
            StagedOp::Block(op) => self.settle::<ManualBlockRecord>(&id, version, record_refs, op),
        }
    }

    /// Whether a local change to `id` is still waiting for the store.
    pub fn is_pending(&self, id: &str) -> bool {
        self.overlays.appointments.is_pending(id) || self.overlays.blocks.is_pending(id)
    }

    /// Number of staged changes not yet completed.
    pub fn pending_writes(&self) -> usize {
        self.overlays.appointments.len() + self.overlays.blocks.len()
    }

    pub fn is_settled(&self) -> bool {
        self.overlays.appointments.is_empty() && self.overlays.blocks.is_empty()
    }

    fn stage_update<R: Overlaid>(&mut self, id: &str, previous: R, patch: &RecordPatch) -> PendingWrite {
        let mut next = previous.clone();
        next.apply_patch(patch);
        // the full target state, so a write never depends on an earlier one landing
        let op = WriteOp::Update(next.to_patch());
        self.stage(id, Some(previous), Some(next), op)
    }

    fn stage<R: Overlaid>(&mut self, id: &str, previous: Option<R>, next: Option<R>, op: WriteOp<R>) -> PendingWrite {
        let record_refs = previous.as_ref().map(ContextBound::context_refs);
        let version = R::ledger(&mut self.overlays).apply(id, previous, next);
        self.reload();
        PendingWrite {
            id: id.to_string(),
            version,
            record_refs,
            op: R::staged(op),
        }
    }

    fn settle<R>(
        &mut self,
        id: &str,
        version: u64,
        record_refs: Option<ResourceRefs>,
        op: WriteOp<R>,
    ) -> Result<WriteOutcome>
    where
        R: Overlaid,
        S: Collection<R>,
    {
        if !R::ledger(&mut self.overlays).is_current(id, version) {
            tracing::debug!(record = id, version, "Skipping superseded write");
            return Err(SchedulingError::Superseded(id.to_string()));
        }

        let simulated = self.projector.simulated().cloned();
        let sources = ContextSources {
            simulated: simulated.as_ref(),
            selected: Some(&self.selection),
            record: record_refs.as_ref(),
        };
        let result = match op {
            WriteOp::Create(record) => self.projector.create(&mut self.store, record, &sources),
            WriteOp::Update(patch) => self.projector.update::<R, S>(&mut self.store, id, &patch, &sources),
            WriteOp::Delete => self.projector.delete::<R, S>(&mut self.store, id),
        };

        let ledger = R::ledger(&mut self.overlays);
        match &result {
            Ok(_) => {
                ledger.confirm(id, version);
            }
            Err(e) => {
                tracing::error!(record = id, error = %e, "Write failed, reverting local change");
                ledger.revert(id, version);
            }
        }
        self.reload();
        result
    }

    fn reload(&mut self) {
        if let Err(e) = self.refresh() {
            tracing::warn!(error = %e, "Could not reload day");
        }
    }

    fn current_appointment(&self, id: &str) -> Result<AppointmentRecord> {
        self.calendar
            .record(id)
            .cloned()
            .or_else(|| Collection::<AppointmentRecord>::get(&self.store, id))
            .ok_or_else(|| SchedulingError::RecordNotFound(id.to_string()))
    }

    fn current_block(&self, id: &str) -> Result<ManualBlockRecord> {
        self.calendar
            .manual_block(id)
            .cloned()
            .or_else(|| Collection::<ManualBlockRecord>::get(&self.store, id))
            .ok_or_else(|| SchedulingError::RecordNotFound(id.to_string()))
    }

    fn ensure_in_grid(&self, start_slot: i64, end_slot: i64) -> Result<()> {
        if start_slot < 0 || end_slot <= start_slot || end_slot > self.calendar.grid().total_slots() {
            return Err(SchedulingError::InvalidRange {
                start: start_slot.to_string(),
                end: end_slot.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_column(&self, column: &ResourceRef) -> Result<()> {
        if self.calendar.has_column(column) {
            Ok(())
        } else {
            Err(SchedulingError::UnknownColumn(column.to_string()))
        }
    }
}

impl<S: RecordStore> std::fmt::Display for CalendarController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.calendar)
    }
}

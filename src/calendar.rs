//! Read model for one day at one location.
//!
//! A `DayCalendar` is rebuilt from a [`DaySnapshot`] whenever the day, the
//! location or the simulation changes. It holds the derived grid, the
//! visible appointments in slot coordinates and the merged blocked slots, and
//! answers placement questions against them.

use chrono::{Datelike, NaiveDate};

use crate::blocked::{self, BlockedRange};
use crate::collision;
use crate::grid::TimeSlotGrid;
use crate::models::{
    AppointmentRecord, BlockedInterval, DaySnapshot, ManualBlockRecord, ResourceColumn,
    ResourceRef, ScheduledAppointment,
};
use crate::schedule::{DerivedSchedule, ScheduleDeriver};
use crate::search;
use crate::simulation::active_view;

#[derive(Debug, Clone)]
pub struct DayCalendar {
    pub date: NaiveDate,
    pub simulated: bool,
    schedule: DerivedSchedule,
    records: Vec<AppointmentRecord>,
    appointments: Vec<ScheduledAppointment>,
    manual_blocks: Vec<ManualBlockRecord>,
    blocked: Vec<BlockedInterval>,
}

impl DayCalendar {
    /// Build the view of `snapshot` for `date`.
    pub fn build(
        deriver: &ScheduleDeriver,
        date: NaiveDate,
        snapshot: &DaySnapshot,
        location: Option<&str>,
        simulated: bool,
    ) -> Self {
        let schedule = deriver.derive(&snapshot.schedules, date.weekday(), location);
        let grid = schedule.grid;

        let records: Vec<AppointmentRecord> = active_view(&snapshot.appointments, simulated)
            .into_iter()
            .filter(|apt| apt.start.date() == date)
            .collect();
        let appointments = records
            .iter()
            .map(|record| ScheduledAppointment {
                id: record.id.clone(),
                column: record.column.clone(),
                start_slot: grid.slot_of(record.start),
                duration_minutes: record.duration_minutes(),
                is_simulation: record.is_simulation,
                replaces_id: record.replaces_id.clone(),
                refs: record.refs.clone(),
            })
            .collect();

        let manual_blocks = active_view(&snapshot.manual_blocks, simulated);
        let blocked = blocked::merge(
            &blocked::from_rule_blocks(&grid, &snapshot.rule_blocks),
            &blocked::expand_breaks(&grid, &schedule.working_practitioners),
            &blocked::expand_manual_blocks(&grid, date, &manual_blocks),
        );

        DayCalendar {
            date,
            simulated,
            schedule,
            records,
            appointments,
            manual_blocks,
            blocked,
        }
    }

    pub fn grid(&self) -> &TimeSlotGrid {
        &self.schedule.grid
    }

    pub fn schedule(&self) -> &DerivedSchedule {
        &self.schedule
    }

    pub fn columns(&self) -> &[ResourceColumn] {
        &self.schedule.columns
    }

    /// Whether `column` is shown on this day.
    pub fn has_column(&self, column: &ResourceRef) -> bool {
        self.schedule.has_column(column)
    }

    /// Visible appointments in slot coordinates.
    pub fn appointments(&self) -> &[ScheduledAppointment] {
        &self.appointments
    }

    /// Appointments in `column`, sorted by start slot.
    pub fn appointments_in(&self, column: &ResourceRef) -> Vec<&ScheduledAppointment> {
        let mut appointments: Vec<&ScheduledAppointment> = self
            .appointments
            .iter()
            .filter(|apt| &apt.column == column)
            .collect();
        appointments.sort_by_key(|apt| apt.start_slot);
        appointments
    }

    /// Projected appointment by id, if visible in the active view.
    pub fn appointment(&self, id: &str) -> Option<&ScheduledAppointment> {
        self.appointments.iter().find(|apt| apt.id == id)
    }

    /// Stored record behind a visible appointment.
    pub fn record(&self, id: &str) -> Option<&AppointmentRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn manual_block(&self, id: &str) -> Option<&ManualBlockRecord> {
        self.manual_blocks.iter().find(|block| block.id == id)
    }

    pub fn blocked_slots(&self) -> &[BlockedInterval] {
        &self.blocked
    }

    /// Blocked interval covering `slot` in `column`, if any.
    pub fn blocked_at(&self, column: &ResourceRef, slot: i64) -> Option<&BlockedInterval> {
        self.blocked
            .iter()
            .find(|entry| &entry.column == column && entry.slot == slot)
    }

    /// Manual blocks regrouped into contiguous ranges.
    pub fn blocked_ranges(&self) -> Vec<BlockedRange> {
        blocked::group_manual(&self.blocked)
    }

    /// Collision check against the visible appointments.
    pub fn has_collision(
        &self,
        column: &ResourceRef,
        start_slot: i64,
        duration_minutes: i64,
        exclude_id: Option<&str>,
    ) -> bool {
        collision::has_collision(
            self.grid(),
            column,
            start_slot,
            duration_minutes,
            &self.appointments,
            exclude_id,
        )
    }

    /// Nearest free start slot among the visible appointments.
    pub fn nearest_free(
        &self,
        column: &ResourceRef,
        target_slot: i64,
        duration_minutes: i64,
        exclude_id: Option<&str>,
    ) -> i64 {
        search::find_nearest_free(
            self.grid(),
            column,
            target_slot,
            duration_minutes,
            &self.appointments,
            exclude_id,
        )
    }

    /// Largest free duration from `start_slot`, ignoring `exclude_id`.
    pub fn max_available_duration(
        &self,
        column: &ResourceRef,
        start_slot: i64,
        exclude_id: Option<&str>,
    ) -> i64 {
        let others: Vec<ScheduledAppointment> = self
            .appointments
            .iter()
            .filter(|apt| exclude_id != Some(apt.id.as_str()))
            .cloned()
            .collect();
        search::max_available_duration(self.grid(), column, start_slot, &others)
    }
}

impl std::fmt::Display for DayCalendar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DayCalendar({}, {:02}:00-{:02}:00, columns={}, appointments={}, blocked={}{})",
            self.date.format("%Y-%m-%d"),
            self.schedule.grid.business_start_hour,
            self.schedule.grid.business_end_hour,
            self.schedule.columns.len(),
            self.appointments.len(),
            self.blocked.len(),
            if self.simulated { ", simulated" } else { "" }
        )
    }
}

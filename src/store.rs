//! Persistence collaborator interface and an in-memory implementation.
//!
//! The engine never owns stored state. Reads go through
//! [`RecordStore::load_day`], writes through [`Collection`] for each record kind.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::error::{Result, SchedulingError};
use crate::models::{
    AppointmentRecord, CalendarRecord, DaySnapshot, ManualBlockRecord, RecordPatch, RuleBlock,
    ScheduleRecord,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayQuery {
    pub date: NaiveDate,
    pub location_id: Option<String>,
}

/// Create/update/delete for one record kind.
pub trait Collection<R: CalendarRecord> {
    fn get(&self, id: &str) -> Option<R>;
    fn create(&mut self, record: R) -> Result<String>;
    fn update(&mut self, id: &str, patch: &RecordPatch) -> Result<()>;
    fn delete(&mut self, id: &str) -> Result<()>;
}

pub trait RecordStore: Collection<AppointmentRecord> + Collection<ManualBlockRecord> {
    /// Everything needed to draw one day at one location.
    fn load_day(&self, query: &DayQuery) -> Result<DaySnapshot>;
}

/// Store backed by plain vectors, kept in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    appointments: Vec<AppointmentRecord>,
    manual_blocks: Vec<ManualBlockRecord>,
    schedules: Vec<ScheduleRecord>,
    rule_blocks: HashMap<NaiveDate, Vec<RuleBlock>>,
    fail_next_write: Option<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }

    /// Seed the store with weekly schedules.
    pub fn with_schedules(mut self, schedules: Vec<ScheduleRecord>) -> Self {
        self.schedules = schedules;
        self
    }

    /// Replace the rule-engine output for `date`.
    pub fn set_rule_blocks(&mut self, date: NaiveDate, rules: Vec<RuleBlock>) {
        self.rule_blocks.insert(date, rules);
    }

    /// Make the next create/update/delete fail with `reason`.
    pub fn fail_next_write(&mut self, reason: impl Into<String>) {
        self.fail_next_write = Some(reason.into());
    }

    pub fn appointments(&self) -> &[AppointmentRecord] {
        &self.appointments
    }

    pub fn manual_blocks(&self) -> &[ManualBlockRecord] {
        &self.manual_blocks
    }

    fn check_write(&mut self) -> Result<()> {
        match self.fail_next_write.take() {
            Some(reason) => Err(SchedulingError::PersistenceFailure(reason)),
            None => Ok(()),
        }
    }
}

fn on_day(date: NaiveDate, start: chrono::NaiveDateTime, end: chrono::NaiveDateTime) -> bool {
    start.date() <= date && end.date() >= date
}

fn at_location(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match (wanted, actual) {
        (Some(wanted), Some(actual)) => wanted == actual,
        _ => true,
    }
}

impl RecordStore for InMemoryStore {
    fn load_day(&self, query: &DayQuery) -> Result<DaySnapshot> {
        let wanted = query.location_id.as_deref();
        Ok(DaySnapshot {
            appointments: self
                .appointments
                .iter()
                .filter(|apt| on_day(query.date, apt.start, apt.end))
                .filter(|apt| at_location(wanted, apt.refs.location_id.as_deref()))
                .cloned()
                .collect(),
            manual_blocks: self
                .manual_blocks
                .iter()
                .filter(|block| on_day(query.date, block.start, block.end))
                .filter(|block| at_location(wanted, block.location_id.as_deref()))
                .cloned()
                .collect(),
            schedules: self.schedules.clone(),
            rule_blocks: self.rule_blocks.get(&query.date).cloned().unwrap_or_default(),
        })
    }
}

macro_rules! vec_collection {
    ($record:ty, $field:ident) => {
        impl Collection<$record> for InMemoryStore {
            fn get(&self, id: &str) -> Option<$record> {
                self.$field.iter().find(|r| r.id() == id).cloned()
            }

            fn create(&mut self, record: $record) -> Result<String> {
                self.check_write()?;
                let id = record.id().to_string();
                self.$field.push(record);
                Ok(id)
            }

            fn update(&mut self, id: &str, patch: &RecordPatch) -> Result<()> {
                self.check_write()?;
                let record = self
                    .$field
                    .iter_mut()
                    .find(|r| r.id() == id)
                    .ok_or_else(|| SchedulingError::RecordNotFound(id.to_string()))?;
                record.apply_patch(patch);
                Ok(())
            }

            fn delete(&mut self, id: &str) -> Result<()> {
                self.check_write()?;
                let before = self.$field.len();
                self.$field.retain(|r| r.id() != id);
                if self.$field.len() == before {
                    return Err(SchedulingError::RecordNotFound(id.to_string()));
                }
                Ok(())
            }
        }
    };
}

vec_collection!(AppointmentRecord, appointments);
vec_collection!(ManualBlockRecord, manual_blocks);

//! Data models for the slot-scheduling engine.
//!
//! Records arrive from the external data source (`AppointmentRecord`,
//! `ManualBlockRecord`, `ScheduleRecord`, `RuleBlock`) and are projected into
//! slot coordinates (`ScheduledAppointment`, `BlockedInterval`) by the engine.

use chrono::{NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SchedulingError};

/// Non-human bookable resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixedResource {
    Ekg,
    Labor,
}

impl FixedResource {
    /// Fixed resource with the given column id.
    pub fn from_id(value: &str) -> Option<Self> {
        match value {
            "ekg" => Some(FixedResource::Ekg),
            "labor" => Some(FixedResource::Labor),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            FixedResource::Ekg => "ekg",
            FixedResource::Labor => "labor",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            FixedResource::Ekg => "EKG",
            FixedResource::Labor => "Labor",
        }
    }
}

/// A calendar column: either a practitioner or a fixed resource.
///
/// Serialized as the plain column id so records from the data source keep
/// their string form (`"ekg"`, `"labor"` or a practitioner id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceRef {
    Practitioner(String),
    Fixed(FixedResource),
}

impl ResourceRef {
    pub fn practitioner(id: impl Into<String>) -> Self {
        ResourceRef::Practitioner(id.into())
    }

    pub fn id(&self) -> &str {
        match self {
            ResourceRef::Practitioner(id) => id,
            ResourceRef::Fixed(resource) => resource.id(),
        }
    }

    /// Practitioner id, `None` for fixed resources.
    pub fn practitioner_id(&self) -> Option<&str> {
        match self {
            ResourceRef::Practitioner(id) => Some(id),
            ResourceRef::Fixed(_) => None,
        }
    }
}

impl PartialOrd for FixedResource {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FixedResource {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id().cmp(other.id())
    }
}

impl From<String> for ResourceRef {
    fn from(value: String) -> Self {
        match FixedResource::from_id(&value) {
            Some(resource) => ResourceRef::Fixed(resource),
            None => ResourceRef::Practitioner(value),
        }
    }
}

impl From<&str> for ResourceRef {
    fn from(value: &str) -> Self {
        ResourceRef::from(value.to_string())
    }
}

impl From<ResourceRef> for String {
    fn from(value: ResourceRef) -> Self {
        value.id().to_string()
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceColumn {
    pub resource: ResourceRef,
    pub title: String,
}

impl ResourceColumn {
    pub fn id(&self) -> &str {
        self.resource.id()
    }
}

/// Identifiers an appointment points at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceRefs {
    pub patient_id: Option<String>,
    pub practitioner_id: Option<String>,
    pub location_id: Option<String>,
    pub practice_id: Option<String>,
    pub appointment_type_id: Option<String>,
}

/// Field overrides applied on update or fork.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub column: Option<ResourceRef>,
    pub title: Option<String>,
}

impl RecordPatch {
    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.column.is_none() && self.title.is_none()
    }
}

/// Shared behaviour of persisted records that take part in simulation forks.
pub trait CalendarRecord: Clone + fmt::Debug {
    fn id(&self) -> &str;
    fn is_simulation(&self) -> bool;
    /// Id of the real record this simulation copy supersedes.
    fn replaces(&self) -> Option<&str>;
    fn apply_patch(&mut self, patch: &RecordPatch);
    /// Patch that sets every editable field to this record's values.
    fn to_patch(&self) -> RecordPatch;
    fn mark_simulation(&mut self);

    /// Copy into a simulation-owned record that supersedes `self`.
    fn fork(&self, new_id: String, patch: &RecordPatch) -> Self;
}

/// An appointment as stored by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub id: String,
    pub column: ResourceRef,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub title: String,
    #[serde(default)]
    pub is_simulation: bool,
    #[serde(default)]
    pub replaces_id: Option<String>,
    #[serde(default)]
    pub refs: ResourceRefs,
}

impl AppointmentRecord {
    /// Create a real appointment with validation.
    pub fn new(
        id: String,
        column: ResourceRef,
        start: NaiveDateTime,
        end: NaiveDateTime,
        title: String,
    ) -> Result<Self> {
        if end <= start {
            return Err(SchedulingError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        Ok(AppointmentRecord {
            id,
            column,
            start,
            end,
            title,
            is_simulation: false,
            replaces_id: None,
            refs: ResourceRefs::default(),
        })
    }

    /// Attach resource references.
    pub fn with_refs(mut self, refs: ResourceRefs) -> Self {
        self.refs = refs;
        self
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

impl CalendarRecord for AppointmentRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_simulation(&self) -> bool {
        self.is_simulation
    }

    fn replaces(&self) -> Option<&str> {
        self.replaces_id.as_deref()
    }

    fn apply_patch(&mut self, patch: &RecordPatch) {
        if let Some(start) = patch.start {
            self.start = start;
        }
        if let Some(end) = patch.end {
            self.end = end;
        }
        if let Some(column) = &patch.column {
            self.column = column.clone();
            if let Some(practitioner) = column.practitioner_id() {
                self.refs.practitioner_id = Some(practitioner.to_string());
            }
        }
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
    }

    fn to_patch(&self) -> RecordPatch {
        RecordPatch {
            start: Some(self.start),
            end: Some(self.end),
            column: Some(self.column.clone()),
            title: Some(self.title.clone()),
        }
    }

    fn mark_simulation(&mut self) {
        self.is_simulation = true;
    }

    fn fork(&self, new_id: String, patch: &RecordPatch) -> Self {
        let mut forked = self.clone();
        forked.id = new_id;
        forked.is_simulation = true;
        forked.replaces_id = Some(self.id.clone());
        forked.apply_patch(patch);
        forked
    }
}

/// A user-created unavailability range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualBlockRecord {
    pub id: String,
    pub column: ResourceRef,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub title: String,
    #[serde(default)]
    pub is_simulation: bool,
    #[serde(default)]
    pub replaces_blocked_slot_id: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
}

impl ManualBlockRecord {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

impl CalendarRecord for ManualBlockRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_simulation(&self) -> bool {
        self.is_simulation
    }

    fn replaces(&self) -> Option<&str> {
        self.replaces_blocked_slot_id.as_deref()
    }

    fn apply_patch(&mut self, patch: &RecordPatch) {
        if let Some(start) = patch.start {
            self.start = start;
        }
        if let Some(end) = patch.end {
            self.end = end;
        }
        if let Some(column) = &patch.column {
            self.column = column.clone();
        }
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
    }

    fn to_patch(&self) -> RecordPatch {
        RecordPatch {
            start: Some(self.start),
            end: Some(self.end),
            column: Some(self.column.clone()),
            title: Some(self.title.clone()),
        }
    }

    fn mark_simulation(&mut self) {
        self.is_simulation = true;
    }

    fn fork(&self, new_id: String, patch: &RecordPatch) -> Self {
        let mut forked = self.clone();
        forked.id = new_id;
        forked.is_simulation = true;
        forked.replaces_blocked_slot_id = Some(self.id.clone());
        forked.apply_patch(patch);
        forked
    }
}

/// An appointment projected onto the slot grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledAppointment {
    pub id: String,
    pub column: ResourceRef,
    pub start_slot: i64,
    pub duration_minutes: i64,
    pub is_simulation: bool,
    pub replaces_id: Option<String>,
    pub refs: ResourceRefs,
}

impl ScheduledAppointment {
    pub fn new(id: impl Into<String>, column: ResourceRef, start_slot: i64, duration_minutes: i64) -> Self {
        ScheduledAppointment {
            id: id.into(),
            column,
            start_slot,
            duration_minutes,
            is_simulation: false,
            replaces_id: None,
            refs: ResourceRefs::default(),
        }
    }
}

/// One blocked `(column, slot)` cell, whatever its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedInterval {
    pub column: ResourceRef,
    pub slot: i64,
    #[serde(default)]
    pub is_manual: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    /// Minutes covered by the whole block this cell belongs to.
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub start_slot: Option<i64>,
}

impl BlockedInterval {
    pub fn new(column: ResourceRef, slot: i64) -> Self {
        BlockedInterval {
            column,
            slot,
            is_manual: false,
            id: None,
            reason: None,
            duration: None,
            start_slot: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Mark as a manual block with the given record id.
    pub fn manual(mut self, id: impl Into<String>) -> Self {
        self.is_manual = true;
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakRange {
    pub start: String,
    pub end: String,
}

/// A practitioner's working window for one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub practitioner_id: String,
    pub practitioner_name: String,
    pub day_of_week: Weekday,
    #[serde(default)]
    pub location_id: Option<String>,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub breaks: Vec<BreakRange>,
}

/// One slot blocked by the scheduling-rules evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBlock {
    pub practitioner_id: String,
    pub time: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub manual_block_id: Option<String>,
}

/// Everything the data source returns for one day and location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaySnapshot {
    pub appointments: Vec<AppointmentRecord>,
    pub manual_blocks: Vec<ManualBlockRecord>,
    pub schedules: Vec<ScheduleRecord>,
    pub rule_blocks: Vec<RuleBlock>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap()
    }

    #[test]
    fn column_strings_parse_into_tagged_resources() {
        assert_eq!(ResourceRef::from("ekg"), ResourceRef::Fixed(FixedResource::Ekg));
        assert_eq!(ResourceRef::from("labor"), ResourceRef::Fixed(FixedResource::Labor));
        assert_eq!(ResourceRef::from("p1"), ResourceRef::practitioner("p1"));
        assert_eq!(ResourceRef::from("p1").to_string(), "p1");
    }

    #[test]
    fn resource_ref_serializes_as_plain_string() {
        let json = serde_json::to_string(&ResourceRef::Fixed(FixedResource::Labor)).unwrap();
        assert_eq!(json, "\"labor\"");
        let back: ResourceRef = serde_json::from_str("\"dr-x\"").unwrap();
        assert_eq!(back, ResourceRef::practitioner("dr-x"));
    }

    #[test]
    fn appointment_rejects_inverted_range() {
        let result = AppointmentRecord::new(
            "a1".to_string(),
            ResourceRef::from("p1"),
            at(9, 0),
            at(8, 0),
            "Checkup".to_string(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn fork_marks_copy_as_simulation_and_links_original() {
        let original = AppointmentRecord::new(
            "a1".to_string(),
            ResourceRef::from("p1"),
            at(9, 0),
            at(9, 30),
            "Checkup".to_string(),
        )
        .unwrap();
        let patch = RecordPatch {
            column: Some(ResourceRef::from("p2")),
            ..RecordPatch::default()
        };

        let forked = original.fork("sim-1".to_string(), &patch);

        assert_eq!(forked.id, "sim-1");
        assert!(forked.is_simulation);
        assert_eq!(forked.replaces(), Some("a1"));
        assert_eq!(forked.column, ResourceRef::from("p2"));
        assert_eq!(forked.refs.practitioner_id.as_deref(), Some("p2"));
        assert_eq!(forked.duration_minutes(), 30);
        assert!(!original.is_simulation);
    }

    #[test]
    fn manual_block_fork_uses_block_back_reference() {
        let block = ManualBlockRecord {
            id: "m1".to_string(),
            column: ResourceRef::from("p1"),
            start: at(12, 0),
            end: at(13, 0),
            title: "Meeting".to_string(),
            is_simulation: false,
            replaces_blocked_slot_id: None,
            location_id: None,
        };
        let forked = block.fork("m1-sim".to_string(), &RecordPatch::default());
        assert_eq!(forked.replaces_blocked_slot_id.as_deref(), Some("m1"));
        assert_eq!(forked.duration_minutes(), 60);
    }

    #[test]
    fn snapshot_deserializes_with_missing_sections() {
        let snapshot: DaySnapshot = serde_json::from_str(
            r#"{ "schedules": [{
                "practitioner_id": "p1",
                "practitioner_name": "Dr. One",
                "day_of_week": "Tue",
                "start": "08:00",
                "end": "12:00"
            }] }"#,
        )
        .unwrap();
        assert_eq!(snapshot.schedules.len(), 1);
        assert_eq!(snapshot.schedules[0].day_of_week, Weekday::Tue);
        assert!(snapshot.appointments.is_empty());
    }
}

//! Derivation of a day's grid and columns from base schedules.

use chrono::Weekday;

use crate::config::EngineConfig;
use crate::error::SchedulingError;
use crate::grid::{minutes_of_day, TimeSlotGrid};
use crate::models::{ResourceColumn, ResourceRef, ScheduleRecord};

/// Grid, columns and working records for one day and location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedSchedule {
    pub grid: TimeSlotGrid,
    pub columns: Vec<ResourceColumn>,
    pub working_practitioners: Vec<ScheduleRecord>,
    /// One entry per dropped record.
    pub warnings: Vec<SchedulingError>,
}

impl DerivedSchedule {
    pub fn business_start_hour(&self) -> i64 {
        self.grid.business_start_hour
    }

    pub fn business_end_hour(&self) -> i64 {
        self.grid.business_end_hour
    }

    pub fn total_slots(&self) -> i64 {
        self.grid.total_slots()
    }

    /// Nobody works this day.
    pub fn is_closed(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether `column` is bookable in this schedule.
    pub fn has_column(&self, column: &ResourceRef) -> bool {
        self.columns.iter().any(|c| &c.resource == column)
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleDeriver {
    config: EngineConfig,
}

impl Default for ScheduleDeriver {
    fn default() -> Self {
        ScheduleDeriver::new(EngineConfig::default())
    }
}

impl ScheduleDeriver {
    pub fn new(config: EngineConfig) -> Self {
        ScheduleDeriver { config }
    }

    /// Derive the grid for `day`, optionally restricted to one location.
    ///
    /// Records without a location are valid everywhere. Records whose times
    /// cannot be parsed are dropped and reported in `warnings`.
    pub fn derive(
        &self,
        schedules: &[ScheduleRecord],
        day: Weekday,
        location: Option<&str>,
    ) -> DerivedSchedule {
        let mut warnings = Vec::new();
        let mut working: Vec<ScheduleRecord> = Vec::new();
        let mut earliest: Option<i64> = None;
        let mut latest: Option<i64> = None;

        let candidates = schedules
            .iter()
            .filter(|record| record.day_of_week == day)
            .filter(|record| match (location, record.location_id.as_deref()) {
                (Some(wanted), Some(actual)) => wanted == actual,
                _ => true,
            });

        for record in candidates {
            match working_window(record) {
                Ok((start, end)) => {
                    earliest = Some(earliest.map_or(start, |e| e.min(start)));
                    latest = Some(latest.map_or(end, |l| l.max(end)));
                    working.push(record.clone());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping schedule record");
                    warnings.push(e);
                }
            }
        }

        if !warnings.is_empty() {
            tracing::warn!(
                dropped = warnings.len(),
                kept = working.len(),
                "Some schedule records were ignored"
            );
        }

        let (Some(earliest), Some(latest)) = (earliest, latest) else {
            tracing::debug!(?day, ?location, "No practitioner works this day");
            return DerivedSchedule {
                grid: TimeSlotGrid::with_slot_duration(0, 0, self.config.slot_duration_minutes),
                columns: Vec::new(),
                working_practitioners: Vec::new(),
                warnings,
            };
        };

        let grid = TimeSlotGrid::with_slot_duration(
            earliest.div_euclid(60),
            (latest + 59).div_euclid(60),
            self.config.slot_duration_minutes,
        );
        let columns = self.columns_for(&working);

        tracing::debug!(
            start_hour = grid.business_start_hour,
            end_hour = grid.business_end_hour,
            total_slots = grid.total_slots(),
            columns = columns.len(),
            "Derived day grid"
        );

        DerivedSchedule {
            grid,
            columns,
            working_practitioners: working,
            warnings,
        }
    }

    fn columns_for(&self, working: &[ScheduleRecord]) -> Vec<ResourceColumn> {
        let mut columns: Vec<ResourceColumn> = Vec::new();
        for record in working {
            let resource = ResourceRef::from(record.practitioner_id.as_str());
            if columns.iter().all(|c| c.resource != resource) {
                columns.push(ResourceColumn {
                    resource,
                    title: record.practitioner_name.clone(),
                });
            }
        }
        if columns.is_empty() {
            return columns;
        }
        for fixed in &self.config.fixed_resources {
            let resource = ResourceRef::Fixed(*fixed);
            if columns.iter().all(|c| c.resource != resource) {
                columns.push(ResourceColumn {
                    resource,
                    title: fixed.title().to_string(),
                });
            }
        }
        columns
    }
}

fn working_window(record: &ScheduleRecord) -> Result<(i64, i64), SchedulingError> {
    let invalid = |reason: String| SchedulingError::InvalidScheduleRecord {
        practitioner: record.practitioner_id.clone(),
        reason,
    };
    let start = minutes_of_day(&record.start).map_err(|e| invalid(e.to_string()))?;
    let end = minutes_of_day(&record.end).map_err(|e| invalid(e.to_string()))?;
    if end <= start {
        return Err(invalid(format!(
            "end {} is not after start {}",
            record.end, record.start
        )));
    }
    Ok((start, end))
}

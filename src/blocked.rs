//! Blocked-slot sources and their merge into one view.
//!
//! Three sources feed the view: the rule engine, recurring breaks from the
//! base schedule and manual blocks created by users. Each is reduced to one
//! [`BlockedInterval`] per `(column, slot)` before merging.

use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

use crate::grid::{minutes_of_day, TimeSlotGrid};
use crate::models::{BlockedInterval, ManualBlockRecord, ResourceRef, RuleBlock, ScheduleRecord};

pub const BREAK_REASON: &str = "Pause";

/// A contiguous manual block regrouped from its per-slot entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedRange {
    pub id: String,
    pub column: ResourceRef,
    pub start_slot: i64,
    /// Exclusive.
    pub end_slot: i64,
    pub reason: Option<String>,
}

/// Merge rule, break and manual blocks into one entry per `(column, slot)`.
///
/// Manual entries replace non-manual ones whatever the input order. Otherwise
/// the first entry seen for a key is kept, so rule beats break and the first
/// manual entry beats later manual entries. Output keeps first-seen key order.
pub fn merge(
    rule_blocks: &[BlockedInterval],
    break_blocks: &[BlockedInterval],
    manual_blocks: &[BlockedInterval],
) -> Vec<BlockedInterval> {
    let mut merged: Vec<BlockedInterval> = Vec::new();
    let mut index: HashMap<(ResourceRef, i64), usize> = HashMap::new();

    for block in rule_blocks.iter().chain(break_blocks).chain(manual_blocks) {
        let key = (block.column.clone(), block.slot);
        match index.get(&key) {
            None => {
                index.insert(key, merged.len());
                merged.push(block.clone());
            }
            Some(&position) => {
                if !merged[position].is_manual && block.is_manual {
                    merged[position] = block.clone();
                }
            }
        }
    }

    merged
}

/// One non-manual entry per slot covered by a break, partial slots included.
pub fn expand_breaks(grid: &TimeSlotGrid, schedules: &[ScheduleRecord]) -> Vec<BlockedInterval> {
    let offset = grid.business_start_hour * 60;
    let mut blocks = Vec::new();

    for record in schedules {
        let column = ResourceRef::from(record.practitioner_id.as_str());
        for range in &record.breaks {
            let (start, end) = match (minutes_of_day(&range.start), minutes_of_day(&range.end)) {
                (Ok(start), Ok(end)) => (start, end),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(
                        practitioner = %record.practitioner_id,
                        error = %e,
                        "Skipping break with invalid time"
                    );
                    continue;
                }
            };

            let first = (start - offset).div_euclid(grid.slot_duration_minutes);
            let last = grid.slots_for(end - offset);
            for slot in first.max(0)..last.min(grid.total_slots()) {
                blocks.push(BlockedInterval::new(column.clone(), slot).with_reason(BREAK_REASON));
            }
        }
    }

    blocks
}

/// One manual entry per slot a block covers on `date`.
///
/// Every entry of a block carries the block's id, title, full duration and
/// first visible slot so the view can regroup them.
pub fn expand_manual_blocks(
    grid: &TimeSlotGrid,
    date: NaiveDate,
    blocks: &[ManualBlockRecord],
) -> Vec<BlockedInterval> {
    let (Ok(day_start), Ok(day_end)) = (grid.at(date, 0), grid.at(date, grid.total_slots())) else {
        return Vec::new();
    };
    let mut expanded = Vec::new();

    for block in blocks {
        if block.end <= day_start || block.start >= day_end {
            continue;
        }

        let first = if block.start <= day_start {
            0
        } else {
            grid.slot_of(block.start)
        };
        let last = if block.end >= day_end {
            grid.total_slots()
        } else {
            grid.slots_for((block.end - day_start).num_minutes())
        };

        for slot in first..last {
            expanded.push(BlockedInterval {
                column: block.column.clone(),
                slot,
                is_manual: true,
                id: Some(block.id.clone()),
                reason: Some(block.title.clone()),
                duration: Some(block.duration_minutes()),
                start_slot: Some(first),
            });
        }
    }

    expanded
}

/// Convert rule-engine output to grid entries.
///
/// An unparsable time is reported and mapped to slot 0.
pub fn from_rule_blocks(grid: &TimeSlotGrid, rules: &[RuleBlock]) -> Vec<BlockedInterval> {
    rules
        .iter()
        .map(|rule| BlockedInterval {
            column: ResourceRef::from(rule.practitioner_id.as_str()),
            slot: grid.time_to_slot_or_default(&rule.time),
            is_manual: false,
            id: rule.manual_block_id.clone(),
            reason: rule.reason.clone(),
            duration: Some(grid.slot_duration_minutes),
            start_slot: None,
        })
        .collect()
}

/// Regroup merged manual entries into contiguous ranges, one per block id.
pub fn group_manual(merged: &[BlockedInterval]) -> Vec<BlockedRange> {
    let mut ranges: Vec<BlockedRange> = Vec::new();
    let mut by_id: HashMap<(&str, &ResourceRef), usize> = HashMap::new();

    for entry in merged.iter().filter(|entry| entry.is_manual) {
        let Some(id) = entry.id.as_deref() else {
            continue;
        };
        match by_id.get(&(id, &entry.column)) {
            Some(&position) => {
                let range = &mut ranges[position];
                range.start_slot = range.start_slot.min(entry.slot);
                range.end_slot = range.end_slot.max(entry.slot + 1);
            }
            None => {
                by_id.insert((id, &entry.column), ranges.len());
                ranges.push(BlockedRange {
                    id: id.to_string(),
                    column: entry.column.clone(),
                    start_slot: entry.slot,
                    end_slot: entry.slot + 1,
                    reason: entry.reason.clone(),
                });
            }
        }
    }

    ranges
}

/// Minutes covered by a regrouped range.
pub fn range_duration(grid: &TimeSlotGrid, range: &BlockedRange) -> Duration {
    Duration::minutes((range.end_slot - range.start_slot) * grid.slot_duration_minutes)
}

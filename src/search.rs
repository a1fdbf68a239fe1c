//! Free-slot search over one column of the grid.

use crate::collision::{has_collision, occupied_ranges, SlotRange};
use crate::grid::TimeSlotGrid;
use crate::models::{ResourceRef, ScheduledAppointment};

/// Find the free slot closest to `target_slot` for an appointment of
/// `duration_minutes`.
///
/// The target is first clamped so the whole appointment fits the grid.
/// Candidates are then tried by increasing distance from the clamped target,
/// earlier slot first at equal distance. If no free placement exists, the
/// clamped target is returned even though it collides.
pub fn find_nearest_free(
    grid: &TimeSlotGrid,
    column: &ResourceRef,
    target_slot: i64,
    duration_minutes: i64,
    existing: &[ScheduledAppointment],
    exclude_id: Option<&str>,
) -> i64 {
    let total_slots = grid.total_slots();
    let duration_slots = grid.slots_for(duration_minutes);
    let clamped = clamp_start(target_slot, duration_slots, total_slots);

    let is_free =
        |slot: i64| !has_collision(grid, column, slot, duration_minutes, existing, exclude_id);
    let fits = |slot: i64| slot >= 0 && slot + duration_slots <= total_slots;

    if is_free(clamped) {
        return clamped;
    }

    for distance in 1..=total_slots {
        let above = clamped - distance;
        if fits(above) && is_free(above) {
            return above;
        }
        let below = clamped + distance;
        if fits(below) && is_free(below) {
            return below;
        }
    }

    tracing::debug!(
        column = %column,
        target_slot,
        duration_minutes,
        "No free placement in column, keeping target"
    );
    clamped
}

/// Largest free duration in minutes starting at `start_slot`.
///
/// Never less than one slot; callers validate the result before booking.
pub fn max_available_duration(
    grid: &TimeSlotGrid,
    column: &ResourceRef,
    start_slot: i64,
    existing: &[ScheduledAppointment],
) -> i64 {
    let mut ranges: Vec<SlotRange> = occupied_ranges(grid, column, existing, None).collect();
    ranges.sort_by_key(|range| range.start);

    let available_slots = match ranges.iter().find(|range| range.start > start_slot) {
        Some(next) => next.start - start_slot,
        None => grid.total_slots() - start_slot,
    };

    available_slots
        .saturating_mul(grid.slot_duration_minutes)
        .max(grid.slot_duration_minutes)
}

fn clamp_start(slot: i64, duration_slots: i64, total_slots: i64) -> i64 {
    slot.min(total_slots - duration_slots).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn grid() -> TimeSlotGrid {
        TimeSlotGrid::new(8, 17)
    }

    fn p1() -> ResourceRef {
        ResourceRef::practitioner("p1")
    }

    fn booked(id: &str, start: i64, minutes: i64) -> ScheduledAppointment {
        ScheduledAppointment::new(id, p1(), start, minutes)
    }

    /// Column p1 booked solid except for slot 50.
    fn packed_except(free: i64) -> Vec<ScheduledAppointment> {
        vec![
            booked("before", 0, free * 5),
            booked("after", free + 1, (108 - free - 1) * 5),
        ]
    }

    #[rstest]
    fn free_target_is_returned_as_is(grid: TimeSlotGrid) {
        assert_eq!(find_nearest_free(&grid, &p1(), 40, 30, &[], None), 40);
    }

    #[rstest]
    fn free_target_is_clamped_to_grid(grid: TimeSlotGrid) {
        assert_eq!(find_nearest_free(&grid, &p1(), 200, 30, &[], None), 102);
        assert_eq!(find_nearest_free(&grid, &p1(), -3, 30, &[], None), 0);
    }

    #[rstest]
    fn finds_the_only_gap(grid: TimeSlotGrid) {
        let existing = packed_except(50);
        assert_eq!(find_nearest_free(&grid, &p1(), 40, 5, &existing, None), 50);
    }

    #[rstest]
    fn earlier_slot_wins_at_equal_distance(grid: TimeSlotGrid) {
        // slots 9 and 11 are free, 10 is taken
        let existing = vec![booked("x", 0, 45), booked("y", 10, 5), booked("z", 12, 30)];
        assert_eq!(find_nearest_free(&grid, &p1(), 10, 5, &existing, None), 9);
    }

    #[rstest]
    fn candidate_must_fit_whole_duration(grid: TimeSlotGrid) {
        // A 30-minute gap at [20, 26) and a larger one from 40 on
        let existing = vec![booked("x", 0, 100), booked("y", 26, 70)];
        assert_eq!(find_nearest_free(&grid, &p1(), 22, 30, &existing, None), 20);
        assert_eq!(find_nearest_free(&grid, &p1(), 22, 35, &existing, None), 40);
    }

    #[rstest]
    fn full_column_falls_back_to_target(grid: TimeSlotGrid) {
        let existing = vec![booked("all", 0, 9 * 60)];
        assert_eq!(find_nearest_free(&grid, &p1(), 50, 30, &existing, None), 50);
        assert_eq!(find_nearest_free(&grid, &p1(), 105, 30, &existing, None), 102);
    }

    #[rstest]
    fn target_past_grid_end_searches_back_from_last_fitting_slot(grid: TimeSlotGrid) {
        // [100, 108) is taken; the last free 30-minute placement starts at 94
        let existing = vec![booked("tail", 100, 40)];

        let slot = find_nearest_free(&grid, &p1(), 110, 30, &existing, None);

        assert_eq!(slot, 94);
        assert!(!has_collision(&grid, &p1(), slot, 30, &existing, None));
    }

    #[rstest]
    fn dragged_appointment_does_not_block_itself(grid: TimeSlotGrid) {
        let existing = vec![booked("me", 10, 30)];
        assert_eq!(find_nearest_free(&grid, &p1(), 12, 30, &existing, Some("me")), 12);
    }

    #[rstest]
    fn search_is_deterministic_and_result_is_free(grid: TimeSlotGrid) {
        let existing = vec![booked("a", 30, 60), booked("b", 45, 20), booked("c", 60, 15)];
        let first = find_nearest_free(&grid, &p1(), 40, 20, &existing, None);
        let second = find_nearest_free(&grid, &p1(), 40, 20, &existing, None);
        assert_eq!(first, second);
        assert!(!has_collision(&grid, &p1(), first, 20, &existing, None));
    }

    #[rstest]
    fn max_duration_runs_to_next_appointment(grid: TimeSlotGrid) {
        let existing = vec![booked("a", 20, 30), booked("b", 40, 10)];
        assert_eq!(max_available_duration(&grid, &p1(), 10, &existing), 50);
        assert_eq!(max_available_duration(&grid, &p1(), 26, &existing), 70);
    }

    #[rstest]
    fn max_duration_runs_to_grid_end(grid: TimeSlotGrid) {
        assert_eq!(max_available_duration(&grid, &p1(), 100, &[]), 40);
    }

    #[rstest]
    fn max_duration_is_at_least_one_slot(grid: TimeSlotGrid) {
        let existing = vec![booked("all", 0, 9 * 60)];
        for slot in 0..grid.total_slots() {
            assert!(max_available_duration(&grid, &p1(), slot, &existing) >= 5);
        }
        assert_eq!(max_available_duration(&grid, &p1(), 107, &[]), 5);
    }
}

//! Collision detection between appointments on the slot grid.
//!
//! All ranges are half-open `[start, end)` in slot units, so back-to-back
//! appointments never collide.

use crate::grid::TimeSlotGrid;
use crate::models::{ResourceRef, ScheduledAppointment};

/// Half-open slot range occupied in one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    pub start: i64,
    pub end: i64,
}

impl SlotRange {
    pub fn new(start: i64, end: i64) -> Self {
        SlotRange { start, end }
    }

    /// Range covered by `duration_minutes` starting at `start`.
    pub fn from_duration(grid: &TimeSlotGrid, start: i64, duration_minutes: i64) -> Self {
        SlotRange::new(start, start.saturating_add(grid.slots_for(duration_minutes)))
    }

    /// True when the two ranges share at least one slot.
    pub fn overlaps_with(&self, other: &SlotRange) -> bool {
        intervals_overlap(self.start, self.end, other.start, other.end)
    }
}

/// Half-open overlap test: `[a_start, a_end)` against `[b_start, b_end)`.
pub fn intervals_overlap(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> bool {
    !(a_end <= b_start || a_start >= b_end)
}

/// Slots an appointment covers, rounded up to whole slots.
pub fn slot_range(grid: &TimeSlotGrid, appointment: &ScheduledAppointment) -> SlotRange {
    SlotRange::from_duration(grid, appointment.start_slot, appointment.duration_minutes)
}

/// Occupied ranges in `column`, skipping `exclude_id`.
pub fn occupied_ranges<'a>(
    grid: &'a TimeSlotGrid,
    column: &'a ResourceRef,
    existing: &'a [ScheduledAppointment],
    exclude_id: Option<&'a str>,
) -> impl Iterator<Item = SlotRange> + 'a {
    existing
        .iter()
        .filter(move |apt| &apt.column == column)
        .filter(move |apt| exclude_id != Some(apt.id.as_str()))
        .map(move |apt| slot_range(grid, apt))
}

/// Whether a candidate placement overlaps any appointment in the same column.
pub fn has_collision(
    grid: &TimeSlotGrid,
    column: &ResourceRef,
    candidate_start_slot: i64,
    candidate_duration_minutes: i64,
    existing: &[ScheduledAppointment],
    exclude_id: Option<&str>,
) -> bool {
    let candidate = SlotRange::from_duration(grid, candidate_start_slot, candidate_duration_minutes);
    occupied_ranges(grid, column, existing, exclude_id).any(|range| candidate.overlaps_with(&range))
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

    fn appointment_a() -> ScheduledAppointment {
        ScheduledAppointment::new("A", p1(), 0, 30)
    }

    #[rstest]
    fn adjacent_placement_does_not_collide(grid: TimeSlotGrid) {
        assert!(!has_collision(&grid, &p1(), 6, 30, &[appointment_a()], None));
    }

    #[rstest]
    fn overlapping_last_slot_collides(grid: TimeSlotGrid) {
        assert!(has_collision(&grid, &p1(), 5, 30, &[appointment_a()], None));
    }

    #[rstest]
    fn placement_ending_at_start_does_not_collide(grid: TimeSlotGrid) {
        let later = ScheduledAppointment::new("B", p1(), 10, 15);
        assert!(!has_collision(&grid, &p1(), 4, 30, &[later.clone()], None));
        assert!(has_collision(&grid, &p1(), 5, 30, &[later], None));
    }

    #[rstest]
    fn excluded_appointment_never_collides_with_itself(grid: TimeSlotGrid) {
        assert!(!has_collision(&grid, &p1(), 0, 30, &[appointment_a()], Some("A")));
        assert!(has_collision(&grid, &p1(), 0, 30, &[appointment_a()], Some("other")));
    }

    #[rstest]
    fn other_columns_are_ignored(grid: TimeSlotGrid) {
        let ekg = ResourceRef::from("ekg");
        assert!(!has_collision(&grid, &ekg, 0, 30, &[appointment_a()], None));
    }

    #[rstest]
    fn partial_slot_durations_round_up(grid: TimeSlotGrid) {
        // 31 minutes occupies 7 slots: [0, 7)
        let long = ScheduledAppointment::new("L", p1(), 0, 31);
        assert!(has_collision(&grid, &p1(), 6, 5, &[long.clone()], None));
        assert!(!has_collision(&grid, &p1(), 7, 5, &[long], None));
    }

    #[rstest]
    #[case(0, 5, 5, 10, false)]
    #[case(0, 6, 5, 10, true)]
    #[case(5, 10, 0, 5, false)]
    #[case(2, 3, 0, 10, true)]
    #[case(0, 10, 2, 3, true)]
    fn half_open_overlap(
        #[case] a_start: i64,
        #[case] a_end: i64,
        #[case] b_start: i64,
        #[case] b_end: i64,
        #[case] expected: bool,
    ) {
        assert_eq!(intervals_overlap(a_start, a_end, b_start, b_end), expected);
    }
}

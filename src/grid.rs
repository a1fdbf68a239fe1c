//! Conversion between time-of-day and zero-based slot indices.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::config::SLOT_DURATION_MINUTES;
use crate::error::{Result, SchedulingError};

const END_OF_DAY: &str = "24:00";

/// Fixed-granularity slot grid over a business-hours window.
///
/// A grid whose end hour is not after its start hour is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlotGrid {
    pub slot_duration_minutes: i64,
    pub business_start_hour: i64,
    pub business_end_hour: i64,
}

impl TimeSlotGrid {
    /// Create a grid with the default slot duration.
    pub fn new(business_start_hour: i64, business_end_hour: i64) -> Self {
        Self::with_slot_duration(business_start_hour, business_end_hour, SLOT_DURATION_MINUTES)
    }

    /// Create a grid with an explicit slot duration.
    pub fn with_slot_duration(
        business_start_hour: i64,
        business_end_hour: i64,
        slot_duration_minutes: i64,
    ) -> Self {
        TimeSlotGrid {
            slot_duration_minutes,
            business_start_hour,
            business_end_hour,
        }
    }

    /// Grid of a day nobody works.
    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    /// True when business start and end coincide.
    pub fn is_empty(&self) -> bool {
        self.total_slots() == 0
    }

    /// Number of slots between business start and end, 0 for an empty grid.
    pub fn total_slots(&self) -> i64 {
        if self.business_end_hour <= self.business_start_hour || self.slot_duration_minutes <= 0 {
            return 0;
        }
        (self.business_end_hour - self.business_start_hour) * 60 / self.slot_duration_minutes
    }

    /// Number of slots needed to hold `minutes`, rounded up.
    pub fn slots_for(&self, minutes: i64) -> i64 {
        let minutes = minutes.max(0);
        minutes.saturating_add(self.slot_duration_minutes - 1) / self.slot_duration_minutes
    }

    /// Slot containing an `HH:MM` time of day.
    pub fn time_to_slot(&self, time_of_day: &str) -> Result<i64> {
        let time = parse_time_of_day(time_of_day)?;
        Ok(self.slot_of_time(time))
    }

    /// Like [`time_to_slot`](Self::time_to_slot) but falls back to slot 0.
    pub fn time_to_slot_or_default(&self, time_of_day: &str) -> i64 {
        match self.time_to_slot(time_of_day) {
            Ok(slot) => slot,
            Err(e) => {
                tracing::warn!(error = %e, "Falling back to slot 0");
                0
            }
        }
    }

    /// Formats as `HH:MM`. Out-of-window slots are not clamped.
    pub fn slot_to_time(&self, slot: i64) -> String {
        let minutes = self.slot_start_minutes(slot);
        format!("{:02}:{:02}", minutes.div_euclid(60), minutes.rem_euclid(60))
    }

    /// Slot containing `time`, negative before business start.
    pub fn slot_of_time(&self, time: NaiveTime) -> i64 {
        let minutes = i64::from(time.hour()) * 60 + i64::from(time.minute());
        (minutes - self.business_start_hour * 60).div_euclid(self.slot_duration_minutes)
    }

    /// Slot of a timestamp's time of day; the date part is ignored.
    pub fn slot_of(&self, timestamp: NaiveDateTime) -> i64 {
        self.slot_of_time(timestamp.time())
    }

    /// Timestamp at which `slot` begins on `date`.
    ///
    /// Fails with `SlotOutOfGrid` when the offset overflows or leaves the
    /// calendar's representable range.
    pub fn at(&self, date: NaiveDate, slot: i64) -> Result<NaiveDateTime> {
        slot.checked_mul(self.slot_duration_minutes)
            .and_then(|minutes| minutes.checked_add(self.business_start_hour * 60))
            .and_then(Duration::try_minutes)
            .and_then(|offset| date.and_time(NaiveTime::MIN).checked_add_signed(offset))
            .ok_or(SchedulingError::SlotOutOfGrid { slot })
    }

    fn slot_start_minutes(&self, slot: i64) -> i64 {
        slot.saturating_mul(self.slot_duration_minutes)
            .saturating_add(self.business_start_hour * 60)
    }
}

/// Parse a strict `HH:MM` time of day.
pub fn parse_time_of_day(input: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M").map_err(|_| {
        SchedulingError::InvalidTimeFormat {
            input: input.to_string(),
        }
    })
}

/// Minutes since midnight of an `HH:MM` string.
///
/// `24:00` is accepted as the end of the day.
pub fn minutes_of_day(input: &str) -> Result<i64> {
    if input.trim() == END_OF_DAY {
        return Ok(24 * 60);
    }
    let time = parse_time_of_day(input)?;
    Ok(i64::from(time.hour()) * 60 + i64::from(time.minute()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn office_hours() -> TimeSlotGrid {
        TimeSlotGrid::new(8, 17)
    }

    #[test]
    fn eight_to_five_has_108_slots() {
        assert_eq!(office_hours().total_slots(), 108);
    }

    #[rstest]
    #[case("08:00", 0)]
    #[case("08:05", 1)]
    #[case("08:07", 1)]
    #[case("12:30", 54)]
    #[case("16:55", 107)]
    #[case("07:55", -1)]
    fn time_to_slot_floors_to_slot_start(#[case] input: &str, #[case] expected: i64) {
        assert_eq!(office_hours().time_to_slot(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("8")]
    #[case("25:00")]
    #[case("08:61")]
    #[case("ab:cd")]
    fn time_to_slot_rejects_garbage(#[case] input: &str) {
        let err = office_hours().time_to_slot(input).unwrap_err();
        assert_eq!(
            err,
            SchedulingError::InvalidTimeFormat {
                input: input.to_string()
            }
        );
    }

    #[test]
    fn unparsable_time_falls_back_to_first_slot() {
        assert_eq!(office_hours().time_to_slot_or_default("noon"), 0);
    }

    #[test]
    fn slot_to_time_formats_and_does_not_clamp() {
        let grid = office_hours();
        assert_eq!(grid.slot_to_time(0), "08:00");
        assert_eq!(grid.slot_to_time(107), "16:55");
        assert_eq!(grid.slot_to_time(108), "17:00");
        assert_eq!(grid.slot_to_time(-12), "07:00");
    }

    #[test]
    fn every_slot_round_trips() {
        for grid in [TimeSlotGrid::new(8, 17), TimeSlotGrid::new(0, 24), TimeSlotGrid::new(6, 7)] {
            for slot in 0..grid.total_slots() {
                assert_eq!(grid.time_to_slot(&grid.slot_to_time(slot)).unwrap(), slot);
            }
        }
    }

    #[test]
    fn inverted_window_is_empty() {
        assert!(TimeSlotGrid::new(17, 8).is_empty());
        assert!(TimeSlotGrid::empty().is_empty());
    }

    #[test]
    fn slots_for_rounds_partial_slots_up() {
        let grid = office_hours();
        assert_eq!(grid.slots_for(30), 6);
        assert_eq!(grid.slots_for(31), 7);
        assert_eq!(grid.slots_for(0), 0);
        assert_eq!(grid.slots_for(-10), 0);
    }

    #[test]
    fn timestamps_map_to_slots_and_back() {
        let grid = office_hours();
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let ts = grid.at(day, 18).unwrap();
        assert_eq!(ts, day.and_hms_opt(9, 30, 0).unwrap());
        assert_eq!(grid.slot_of(ts), 18);
    }

    #[test]
    fn huge_slot_is_rejected_instead_of_overflowing() {
        let grid = office_hours();
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        assert_eq!(
            grid.at(day, i64::MAX / 4).unwrap_err(),
            SchedulingError::SlotOutOfGrid { slot: i64::MAX / 4 }
        );
        assert!(grid.at(day, -1).is_ok());
    }

    #[test]
    fn midnight_end_of_day_is_a_valid_time() {
        assert_eq!(minutes_of_day("24:00").unwrap(), 1440);
        assert_eq!(minutes_of_day("23:30").unwrap(), 1410);
        assert!(minutes_of_day("24:30").is_err());
    }
}

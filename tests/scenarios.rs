//! End-to-end checks through the public API.

use chrono::{Duration, NaiveDate, NaiveDateTime, Weekday};
use rstest::{fixture, rstest};

use slotgrid::blocked;
use slotgrid::collision::has_collision;
use slotgrid::context::SimulatedContext;
use slotgrid::models::{
    AppointmentRecord, BlockedInterval, ResourceRef, ResourceRefs, ScheduleRecord, ScheduledAppointment,
};
use slotgrid::schedule::ScheduleDeriver;
use slotgrid::search::{find_nearest_free, max_available_duration};
use slotgrid::store::{Collection, InMemoryStore};
use slotgrid::{BookingRequest, CalendarController, EngineConfig, SchedulingError, TimeSlotGrid};

fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
}

fn at(hour: u32, minute: u32) -> NaiveDateTime {
    tuesday().and_hms_opt(hour, minute, 0).unwrap()
}

fn p1() -> ResourceRef {
    ResourceRef::from("p1")
}

fn schedule(id: &str, start: &str, end: &str) -> ScheduleRecord {
    ScheduleRecord {
        practitioner_id: id.to_string(),
        practitioner_name: format!("Dr. {id}"),
        day_of_week: Weekday::Tue,
        location_id: None,
        start: start.to_string(),
        end: end.to_string(),
        breaks: Vec::new(),
    }
}

#[fixture]
fn grid() -> TimeSlotGrid {
    TimeSlotGrid::new(8, 17)
}

#[rstest]
#[case("08:00", 0)]
#[case("08:05", 1)]
#[case("12:30", 54)]
fn scenario_1_grid_conversions(grid: TimeSlotGrid, #[case] time: &str, #[case] slot: i64) {
    assert_eq!(grid.total_slots(), 108);
    assert_eq!(grid.time_to_slot(time).unwrap(), slot);
    assert_eq!(grid.slot_to_time(slot), time);
}

#[rstest]
fn grid_round_trips_every_slot(grid: TimeSlotGrid) {
    for slot in 0..grid.total_slots() {
        assert_eq!(grid.time_to_slot(&grid.slot_to_time(slot)).unwrap(), slot);
    }
}

#[rstest]
fn scenario_2_adjacent_appointments_do_not_collide(grid: TimeSlotGrid) {
    let existing = vec![ScheduledAppointment::new("a", p1(), 0, 30)];
    assert!(!has_collision(&grid, &p1(), 6, 30, &existing, None));
    assert!(has_collision(&grid, &p1(), 5, 30, &existing, None));
    assert!(!has_collision(&grid, &p1(), 0, 30, &existing, Some("a")));
}

#[rstest]
fn scenario_3_search_finds_the_only_gap(grid: TimeSlotGrid) {
    let existing = vec![
        ScheduledAppointment::new("before", p1(), 0, 50 * 5),
        ScheduledAppointment::new("after", p1(), 51, 57 * 5),
    ];

    let slot = find_nearest_free(&grid, &p1(), 40, 5, &existing, None);

    assert_eq!(slot, 50);
    assert!(!has_collision(&grid, &p1(), slot, 5, &existing, None));
    assert_eq!(find_nearest_free(&grid, &p1(), 40, 5, &existing, None), slot);
    for start in 0..grid.total_slots() {
        assert!(max_available_duration(&grid, &p1(), start, &existing) >= 5);
    }
}

#[rstest]
fn scenario_4_manual_entry_wins_the_merge() {
    let rule = vec![BlockedInterval::new(p1(), 3).with_reason("R")];
    let manual = vec![BlockedInterval::new(p1(), 3).manual("m1")];

    for merged in [
        blocked::merge(&rule, &[], &manual),
        blocked::merge(&[], &rule, &manual),
    ] {
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0], manual[0]);
    }
    assert_eq!(
        blocked::merge(&rule, &[], &manual),
        blocked::merge(&rule, &[], &manual)
    );
}

#[test]
fn scenario_5_schedule_derivation() {
    let derived = ScheduleDeriver::default().derive(
        &[schedule("p1", "08:00", "12:00"), schedule("p2", "09:00", "17:00")],
        Weekday::Tue,
        None,
    );

    assert_eq!(derived.business_start_hour(), 8);
    assert_eq!(derived.business_end_hour(), 17);
    let ids: Vec<&str> = derived.columns.iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec!["p1", "p2", "ekg", "labor"]);
}

#[fixture]
fn controller() -> CalendarController<InMemoryStore> {
    let refs = ResourceRefs {
        location_id: Some("north".to_string()),
        practice_id: Some("practice".to_string()),
        appointment_type_id: Some("checkup".to_string()),
        ..ResourceRefs::default()
    };
    let mut store = InMemoryStore::new().with_schedules(vec![
        schedule("p1", "08:00", "12:00"),
        schedule("p2", "09:00", "17:00"),
    ]);
    for (id, start) in [("a1", at(8, 0)), ("a2", at(9, 0))] {
        let record = AppointmentRecord::new(
            id.to_string(),
            p1(),
            start,
            start + Duration::minutes(30),
            "Visit".to_string(),
        )
        .unwrap()
        .with_refs(refs.clone());
        Collection::<AppointmentRecord>::create(&mut store, record).unwrap();
    }
    CalendarController::new(store, EngineConfig::default(), tuesday(), refs).unwrap()
}

#[rstest]
fn dragging_onto_a_taken_slot_snaps_away(mut controller: CalendarController<InMemoryStore>) {
    controller.begin_drag("a2").unwrap();
    let outcome = controller.drop_at(p1(), 2).unwrap();

    assert_eq!(outcome.slot, 6);
    let calendar = controller.calendar();
    assert!(!calendar.has_collision(&p1(), outcome.slot, 30, Some("a2")));
    assert_eq!(controller.store().appointments()[1].start, at(8, 30));
}

#[rstest]
fn persistence_failure_leaves_the_view_unchanged(mut controller: CalendarController<InMemoryStore>) {
    controller.store_mut().fail_next_write("timeout");

    let err = controller.resize("a1", 20).unwrap_err();

    assert!(matches!(err, SchedulingError::PersistenceFailure(_)));
    assert_eq!(controller.calendar().appointment("a1").unwrap().duration_minutes, 30);

    // the next write goes through
    assert_eq!(controller.resize("a1", 20).unwrap().duration_minutes, 20);
}

#[rstest]
fn simulation_bookings_stay_out_of_the_real_view(mut controller: CalendarController<InMemoryStore>) {
    controller.enter_simulation(SimulatedContext::new("what-if")).unwrap();
    let booked = controller
        .book_at(BookingRequest {
            column: ResourceRef::from("ekg"),
            slot: 30,
            duration_minutes: 15,
            title: "EKG".to_string(),
            patient_id: None,
        })
        .unwrap();
    assert!(controller.calendar().appointment(&booked.id).unwrap().is_simulation);

    controller.leave_simulation().unwrap();
    assert!(controller.calendar().appointment(&booked.id).is_none());
    assert_eq!(controller.store().appointments().len(), 3);
}

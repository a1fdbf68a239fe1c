//! Demo driver for the slot-scheduling engine.
//!
//! Builds an in-memory day with two practitioners, then walks through a
//! drag, two staged resizes, a booking, a manual block and a simulation fork, printing
//! the calendar after each step. An optional first argument names a JSON
//! engine configuration file.

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime};

use slotgrid::blocked::range_duration;
use slotgrid::config::{self, EngineConfig};
use slotgrid::context::SimulatedContext;
use slotgrid::models::{AppointmentRecord, BreakRange, ResourceRef, ResourceRefs, RuleBlock, ScheduleRecord};
use slotgrid::store::{Collection, InMemoryStore};
use slotgrid::{BookingRequest, CalendarController, DayCalendar, Result, SchedulingError};

fn load_config() -> Result<EngineConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| SchedulingError::Config(format!("{path}: {e}")))?;
            EngineConfig::from_json(&raw)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn schedule(id: &str, name: &str, day: NaiveDate, start: &str, end: &str) -> ScheduleRecord {
    ScheduleRecord {
        practitioner_id: id.to_string(),
        practitioner_name: name.to_string(),
        day_of_week: day.weekday(),
        location_id: Some("main-clinic".to_string()),
        start: start.to_string(),
        end: end.to_string(),
        breaks: Vec::new(),
    }
}

fn selection() -> ResourceRefs {
    ResourceRefs {
        location_id: Some("main-clinic".to_string()),
        practice_id: Some("family-practice".to_string()),
        appointment_type_id: Some("consultation".to_string()),
        ..ResourceRefs::default()
    }
}

fn seed_store(day: NaiveDate) -> Result<InMemoryStore> {
    let at = |hour: u32, minute: u32| -> Result<NaiveDateTime> {
        day.and_hms_opt(hour, minute, 0)
            .ok_or_else(|| SchedulingError::InvalidTimeFormat {
                input: format!("{hour:02}:{minute:02}"),
            })
    };

    let mut morning = schedule("dr-demo", "Dr. Demo", day, "08:00", "12:00");
    morning.breaks.push(BreakRange {
        start: "10:00".to_string(),
        end: "10:15".to_string(),
    });
    let mut store = InMemoryStore::new().with_schedules(vec![
        morning,
        schedule("dr-second", "Dr. Second", day, "09:00", "17:00"),
    ]);
    store.set_rule_blocks(
        day,
        vec![RuleBlock {
            practitioner_id: "dr-second".to_string(),
            time: "16:30".to_string(),
            reason: Some("No new patients".to_string()),
            manual_block_id: None,
        }],
    );

    let bookings = [
        ("P001", "dr-demo", (8, 0), 30, "Annual checkup"),
        ("P002", "dr-demo", (9, 0), 30, "Severe chest pain"),
        ("P003", "dr-second", (14, 0), 60, "Follow-up on test results"),
    ];
    for (patient, column, (hour, minute), minutes, title) in bookings {
        let start = at(hour, minute)?;
        let record = AppointmentRecord::new(
            format!("apt-{patient}"),
            ResourceRef::from(column),
            start,
            start + Duration::minutes(minutes),
            title.to_string(),
        )?
        .with_refs(ResourceRefs {
            patient_id: Some(patient.to_string()),
            practitioner_id: Some(column.to_string()),
            ..selection()
        });
        Collection::<AppointmentRecord>::create(&mut store, record)?;
    }

    Ok(store)
}

fn print_calendar(heading: &str, calendar: &DayCalendar) {
    println!("\n--- {heading} ---");
    println!("{calendar}");
    let grid = calendar.grid();

    for column in calendar.columns() {
        println!("  {} ({})", column.title, column.id());
        for apt in calendar.appointments_in(&column.resource) {
            let end_slot = apt.start_slot + grid.slots_for(apt.duration_minutes);
            println!(
                "    {}-{}  {}{}",
                grid.slot_to_time(apt.start_slot),
                grid.slot_to_time(end_slot),
                calendar.record(&apt.id).map(|r| r.title.as_str()).unwrap_or("?"),
                if apt.is_simulation { "  [simulated]" } else { "" }
            );
        }
        for range in calendar
            .blocked_ranges()
            .iter()
            .filter(|range| range.column == column.resource)
        {
            println!(
                "    {}-{}  blocked: {} ({} min)",
                grid.slot_to_time(range.start_slot),
                grid.slot_to_time(range.end_slot),
                range.reason.as_deref().unwrap_or("-"),
                range_duration(grid, range).num_minutes()
            );
        }
    }
}

fn run_demo() -> Result<()> {
    let engine_config = load_config()?;
    slotgrid::init_tracing(&engine_config.log_filter);
    tracing::info!("{} v{} demo", config::APP_NAME, config::APP_VERSION);

    let day = (Local::now() + Duration::days(1)).date_naive();
    let store = seed_store(day)?;
    let mut controller = CalendarController::new(store, engine_config, day, selection())?;
    print_calendar("Initial day", controller.calendar());

    let demo = ResourceRef::from("dr-demo");
    controller.begin_drag("apt-P001")?;
    let dropped = controller.drop_at(demo.clone(), 13)?;
    println!(
        "\nDropped apt-P001 at {} (asked for {})",
        controller.calendar().grid().slot_to_time(dropped.slot),
        controller.calendar().grid().slot_to_time(13)
    );

    // two quick resizes: only the newer one reaches the store
    let (_, first) = controller.stage_resize("apt-P002", 45)?;
    let (minutes, second) = controller.stage_resize("apt-P002", 90)?;
    if let Err(e) = controller.complete(first) {
        println!("Skipped: {e}");
    }
    println!("{} change(s) still pending", controller.pending_writes());
    controller.complete(second)?;
    println!("Resized apt-P002 to {minutes} minutes, settled: {}", controller.is_settled());

    let booked = controller.book_at(BookingRequest {
        column: ResourceRef::from("ekg"),
        slot: 12,
        duration_minutes: 20,
        title: "Resting EKG".to_string(),
        patient_id: Some("P004".to_string()),
    })?;
    println!("Booked {} on the EKG", booked.id);

    controller.block_range(ResourceRef::from("dr-second"), 48, 60, "Team meeting")?;
    print_calendar("After edits", controller.calendar());

    controller.enter_simulation(SimulatedContext::new("what-if"))?;
    controller.begin_drag("apt-P003")?;
    let fork = controller.drop_at(ResourceRef::from("dr-second"), 24)?;
    println!(
        "\nSimulation moved apt-P003 into fork {} at {}",
        fork.write.id,
        controller.calendar().grid().slot_to_time(fork.slot)
    );
    print_calendar("Simulated view", controller.calendar());

    controller.leave_simulation()?;
    print_calendar("Back to real view", controller.calendar());

    Ok(())
}

fn main() {
    if let Err(e) = run_demo() {
        tracing::error!(error = %e, "Demo failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

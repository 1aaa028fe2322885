//! End-to-end tests of the generation pipeline
//!
//! These run the scheduler stage by stage through its public methods and check the
//! invariants that hold across the three tables.

use chrono::{NaiveDate, NaiveTime, Timelike};
use medscheduler::appointments::{format_hms, parse_hms};
use medscheduler::types::config::HourSpec;
use medscheduler::{AppointmentScheduler, AppointmentStatus, SchedulerConfig};
use std::collections::{BTreeMap, BTreeSet};

fn config(seed: u64) -> SchedulerConfig {
    SchedulerConfig {
        date_ranges: vec![("2024-01-01".into(), "2024-04-30".into())],
        ref_date: "2024-04-01".into(),
        seed: Some(seed),
        ..Default::default()
    }
}

fn generated(seed: u64) -> AppointmentScheduler {
    let mut scheduler = AppointmentScheduler::new(config(seed)).unwrap();
    scheduler.generate().unwrap();
    scheduler
}

#[test]
fn test_slot_table_follows_working_calendar() {
    let mut scheduler = AppointmentScheduler::new(SchedulerConfig {
        date_ranges: vec![("2024-01-01".into(), "2024-01-31".into())],
        ref_date: "2024-01-15".into(),
        ..Default::default()
    })
    .unwrap();
    let slots = scheduler.generate_slots().to_vec();

    // 23 weekdays in January 2024, 10 hours of 15-minute slots each
    assert_eq!(slots.len(), 23 * 40);
    assert_eq!(slots[0].slot_id.as_str(), "001");
    assert_eq!(slots[0].appointment_time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    assert!(slots.iter().all(|s| s.is_available));
    assert!(slots.windows(2).all(|w| w[0].datetime() < w[1].datetime()));
    assert!(slots.iter().all(|s| s.appointment_time.minute() % 15 == 0));
    assert!(slots.iter().all(|s| s.appointment_time.hour() >= 8 && s.appointment_time.hour() < 18));
}

#[test]
fn test_appointments_before_slots_is_an_error() {
    let mut scheduler = AppointmentScheduler::new(config(1)).unwrap();
    let err = scheduler.generate_appointments().unwrap_err();
    assert!(err.is_value_error());
    assert!(scheduler.appointments().is_empty());
}

#[test]
fn test_same_seed_gives_identical_tables() {
    let first = generated(2024);
    let second = generated(2024);

    assert_eq!(first.slots(), second.slots());
    assert_eq!(first.appointments(), second.appointments());
    assert_eq!(first.patients(), second.patients());

    let other = generated(2025);
    assert_ne!(first.appointments(), other.appointments());
}

#[test]
fn test_appointment_rows_are_consistent() {
    let scheduler = generated(7);
    let config = scheduler.config();
    let appointments = scheduler.appointments();
    assert!(!appointments.is_empty());

    let mut seen_slots = BTreeSet::new();
    for (i, a) in appointments.iter().enumerate() {
        assert_eq!(a.appointment_id.sequence(), Some(i + 1));
        assert!(seen_slots.insert(a.slot_id.clone()), "slot {} booked twice", a.slot_id);
        assert!(a.scheduling_date <= a.appointment_date);
        assert_eq!(
            (a.appointment_date - a.scheduling_date).num_days(),
            i64::from(a.scheduling_interval)
        );

        let is_future = a.datetime() >= config.ref_date;
        assert_eq!(a.status == AppointmentStatus::Scheduled, is_future);
        if is_future {
            assert!(a.appointment_date <= config.horizon_end());
        }
        assert_eq!(a.has_timing(), a.status == AppointmentStatus::Attended);
    }
    assert!(appointments.windows(2).all(|w| w[0].datetime() <= w[1].datetime()));

    // Every booked slot is marked unavailable
    let booked: usize = scheduler.slots().iter().filter(|s| !s.is_available).count();
    assert_eq!(booked, appointments.len());
}

#[test]
fn test_attended_timing_fields() {
    let scheduler = generated(8);
    let attended: Vec<_> = scheduler
        .appointments()
        .iter()
        .filter(|a| a.status == AppointmentStatus::Attended)
        .collect();
    assert!(!attended.is_empty());

    for a in attended {
        let slot = a.datetime();
        let check_in = a.check_in_time.unwrap();
        let start = a.start_time.unwrap();
        let end = a.end_time.unwrap();
        assert!(start >= slot);
        assert!(start >= check_in);
        assert_eq!(start, slot.max(check_in));
        assert_eq!((end - start).num_minutes(), i64::from(a.appointment_duration.unwrap()));
        assert!(a.appointment_duration.unwrap() >= 1);

        // HH:MM:SS rendering survives a parse
        for time in [check_in.time(), start.time(), end.time()] {
            let text = format_hms(time);
            assert_eq!(text.len(), 8);
            assert_eq!(parse_hms(&text).unwrap(), time);
        }
    }
}

#[test]
fn test_late_evening_visits_run_past_midnight() {
    let mut scheduler = AppointmentScheduler::new(SchedulerConfig {
        date_ranges: vec![("2024-01-01".into(), "2024-03-31".into())],
        ref_date: "2024-03-01".into(),
        working_hours: vec![(HourSpec::Hour(20), HourSpec::Hour(24))],
        appointments_per_hour: 4,
        check_in_time_mean: 10.0,
        seed: Some(1),
        ..Default::default()
    })
    .unwrap();
    scheduler.generate().unwrap();

    let attended: Vec<_> = scheduler
        .appointments()
        .iter()
        .filter(|a| a.status == AppointmentStatus::Attended)
        .collect();
    assert!(attended.len() > 300);

    let mut past_midnight = 0;
    for a in &attended {
        let slot = a.datetime();
        let start = a.start_time.unwrap();
        let end = a.end_time.unwrap();
        assert!(start >= slot, "start {start} before slot {slot}");
        assert!(end > start, "end {end} not after start {start}");
        if end.date() > a.appointment_date {
            past_midnight += 1;
        }
    }
    assert!(past_midnight > 0);

    let offset = scheduler.statistics().mean_check_in_offset.unwrap();
    assert!((offset - 10.0).abs() < 2.0, "mean check-in offset {offset}");
}

#[test]
fn test_patients_linked_within_age_cutoffs() {
    let mut config = config(21);
    config.lower_cutoff = 30;
    config.upper_cutoff = 60;
    let mut scheduler = AppointmentScheduler::new(config).unwrap();
    scheduler.generate().unwrap();

    let patients: BTreeMap<_, _> = scheduler
        .patients()
        .iter()
        .map(|p| (p.patient_id.clone(), p))
        .collect();
    assert!(!patients.is_empty());
    for p in patients.values() {
        assert!((30..=60).contains(&p.age), "age {}", p.age);
    }

    for a in scheduler.appointments() {
        let id = a.patient_id.as_ref().unwrap();
        let patient = patients[id];
        assert_eq!(a.sex, Some(patient.sex));
        assert_eq!(a.age, Some(patient.age));
        assert_eq!(a.age_group.as_deref(), Some(patient.age_group.as_str()));
        assert!(a.is_first_attendance.is_some());
    }

    // Each patient's first appointment is flagged as a first attendance
    let mut firsts = BTreeSet::new();
    for a in scheduler.appointments().iter().filter(|a| a.rebook_iteration == 0) {
        if a.is_first_attendance == Some(true) {
            firsts.insert(a.patient_id.clone());
        }
    }
    assert_eq!(firsts.len(), patients.len());
}

#[test]
fn test_visit_cap_limits_appointments_per_patient() {
    let scheduler = generated(33);
    let cap = scheduler.config().max_visits_per_patient() as usize;

    let mut originals: BTreeMap<_, usize> = BTreeMap::new();
    for a in scheduler.appointments().iter().filter(|a| a.rebook_iteration == 0) {
        *originals.entry(a.patient_id.clone()).or_default() += 1;
    }
    assert!(originals.values().all(|&n| n <= cap));
}

#[test]
fn test_standalone_patients_drop_links() {
    let mut scheduler = generated(5);
    let patients = scheduler.generate_patients(250).unwrap().to_vec();

    assert_eq!(patients.len(), 250);
    assert_eq!(patients[0].patient_id.as_str(), "001");
    assert!(scheduler.appointments().iter().all(|a| a.patient_id.is_none()));
    assert!(scheduler.generate_patients(0).unwrap_err().is_value_error());
}

#[test]
fn test_custom_columns() {
    let mut scheduler = generated(6);
    scheduler
        .add_custom_column("insurance", &["public", "private", "none"], "uniform", None)
        .unwrap();
    scheduler
        .add_custom_column("priority", &["low", "high"], "normal", Some(&[0.9, 0.1][..]))
        .unwrap();

    let allowed = ["public", "private", "none"];
    for p in scheduler.patients() {
        assert!(allowed.contains(&p.custom["insurance"].as_str()));
        assert!(p.custom.contains_key("priority"));
    }

    // Failed additions leave the table as it was
    let before = scheduler.patients().to_vec();
    assert!(scheduler.add_custom_column("insurance", &["x"], "uniform", None).is_err());
    assert!(scheduler.add_custom_column("age", &["x"], "uniform", None).is_err());
    assert!(scheduler.add_custom_column("tier", &["a", "b"], "poisson", None).is_err());
    assert!(scheduler
        .add_custom_column("tier", &["a", "b"], "uniform", Some(&[1.0][..]))
        .is_err());
    let no_categories: [&str; 0] = [];
    assert!(scheduler.add_custom_column("tier", &no_categories, "uniform", None).is_err());
    assert_eq!(scheduler.patients(), &before[..]);
}

#[test]
fn test_custom_column_needs_patients() {
    let mut scheduler = AppointmentScheduler::new(config(4)).unwrap();
    let err = scheduler
        .add_custom_column("insurance", &["public"], "uniform", None)
        .unwrap_err();
    assert!(err.is_value_error());
}

#[test]
fn test_helper_operations() {
    let mut scheduler = AppointmentScheduler::new(config(9)).unwrap();

    let pmf = scheduler.lead_time_pmf(30);
    assert_eq!(pmf.max_interval(), 30);
    assert!((pmf.pmf.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    assert_eq!(pmf.median(), Some(10));
    assert!(scheduler.lead_time_pmf(0).is_empty());

    let weekday = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
    assert!(scheduler.date_weight_raw(weekday) > 0.0);

    let slot_time = NaiveDate::from_ymd_opt(2024, 1, 8)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    let check_in = scheduler.generate_check_in_time(slot_time).unwrap();
    assert!((check_in - slot_time).num_hours().abs() < 3);
    assert_eq!(check_in.nanosecond(), 0);
}

#[test]
fn test_assign_status_on_caller_rows() {
    let mut scheduler = generated(12);
    let ref_date = scheduler.config().ref_date;
    let mut rows = scheduler.appointments().to_vec();
    scheduler.assign_status(&mut rows).unwrap();

    for row in &rows {
        assert_eq!(row.status == AppointmentStatus::Scheduled, row.datetime() >= ref_date);
        assert_eq!(row.has_timing(), row.status == AppointmentStatus::Attended);
    }
}

#[test]
fn test_regenerating_slots_resets_downstream_tables() {
    let mut scheduler = generated(13);
    assert!(!scheduler.appointments().is_empty());

    scheduler.generate_slots();
    assert!(scheduler.appointments().is_empty());
    assert!(scheduler.patients().is_empty());
    assert!(scheduler.slots().iter().all(|s| s.is_available));
}

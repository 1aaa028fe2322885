//! Rebooking behaviour seen through the finished appointment table

use medscheduler::{
    Appointment, AppointmentId, AppointmentScheduler, AppointmentStatus, RebookCategory, SchedulerConfig,
};
use std::collections::{BTreeMap, BTreeSet};

fn scheduler(category: &str, seed: u64) -> AppointmentScheduler {
    let mut scheduler = AppointmentScheduler::new(SchedulerConfig {
        date_ranges: vec![("2024-01-01".into(), "2024-06-30".into())],
        ref_date: "2024-06-01".into(),
        rebook_category: category.to_string(),
        seed: Some(seed),
        ..Default::default()
    })
    .unwrap();
    scheduler.generate().unwrap();
    scheduler
}

fn by_id(appointments: &[Appointment]) -> BTreeMap<AppointmentId, &Appointment> {
    appointments.iter().map(|a| (a.appointment_id.clone(), a)).collect()
}

/// Failed originals that the pipeline did not rebook
fn without_successor(appointments: &[Appointment], n: usize) -> Vec<Appointment> {
    let rebooked: BTreeSet<&AppointmentId> =
        appointments.iter().filter_map(|a| a.rebooked_from.as_ref()).collect();
    appointments
        .iter()
        .filter(|a| a.status.is_rebookable() && a.rebook_iteration == 0)
        .filter(|a| !rebooked.contains(&a.appointment_id))
        .take(n)
        .cloned()
        .collect()
}

#[test]
fn test_rebook_depth_per_category() {
    for category in [RebookCategory::Min, RebookCategory::Med, RebookCategory::Max] {
        let scheduler = scheduler(&category.to_string(), 42);
        let appointments = scheduler.appointments();
        let deepest = appointments.iter().map(|a| a.rebook_iteration).max().unwrap_or(0);

        assert!(deepest >= 1, "{category} produced no rebookings");
        assert!(deepest <= category.max_iterations(), "{category} reached depth {deepest}");
    }
}

#[test]
fn test_more_intense_categories_rebook_more() {
    let share = |category: &str| {
        let stats = scheduler(category, 17).statistics();
        stats.rebooked_percentage()
    };
    assert!(share("min") < share("max"));
}

#[test]
fn test_lineage_points_backwards_to_failed_rows() {
    let scheduler = scheduler("max", 5);
    let appointments = scheduler.appointments();
    let index = by_id(appointments);

    for successor in appointments.iter().filter(|a| a.rebook_iteration > 0) {
        let origin_id = successor.rebooked_from.as_ref().expect("successor without origin");
        let origin = index[origin_id];

        assert!(origin.status.is_rebookable());
        assert_eq!(successor.rebook_iteration, origin.rebook_iteration + 1);
        assert_eq!(successor.scheduling_date, origin.appointment_date);
        assert!(successor.appointment_date > origin.appointment_date);
        assert!(successor.appointment_id > origin.appointment_id);

        // The same person comes back
        assert_eq!(successor.patient_id, origin.patient_id);
        assert_eq!(successor.is_first_attendance, origin.is_first_attendance);
    }

    for original in appointments.iter().filter(|a| a.rebook_iteration == 0) {
        assert!(original.rebooked_from.is_none());
    }
}

#[test]
fn test_rebook_selected_appointments() {
    let mut scheduler = scheduler("max", 9);
    let before = scheduler.appointments().len();
    let candidates = without_successor(scheduler.appointments(), 40);
    assert!(!candidates.is_empty());

    let new_rows = scheduler.rebook_appointments(&candidates).unwrap();
    assert!(!new_rows.is_empty());
    assert!(new_rows.len() <= candidates.len() * RebookCategory::Max.max_iterations() as usize);

    let appointments = scheduler.appointments();
    assert_eq!(appointments.len(), before + new_rows.len());
    for (i, a) in appointments.iter().enumerate() {
        assert_eq!(a.appointment_id.sequence(), Some(i + 1));
    }

    let index = by_id(appointments);
    for row in &new_rows {
        assert!(row.rebook_iteration >= 1);
        let origin = index[row.rebooked_from.as_ref().unwrap()];
        assert_eq!(row.patient_id, origin.patient_id);
        assert!(index.contains_key(&row.appointment_id));
    }

    // Patients survive a targeted rebooking
    assert!(!scheduler.patients().is_empty());
}

#[test]
fn test_rebook_rejects_bad_candidates() {
    let mut scheduler = scheduler("med", 10);
    let before = scheduler.appointments().to_vec();

    let attended: Vec<Appointment> = before
        .iter()
        .filter(|a| !a.status.is_rebookable())
        .take(2)
        .cloned()
        .collect();
    assert!(scheduler.rebook_appointments(&attended).unwrap_err().is_value_error());

    let mut stranger = before
        .iter()
        .find(|a| a.status.is_rebookable())
        .cloned()
        .unwrap();
    stranger.appointment_id = AppointmentId::from_raw("no-such-appointment");
    assert!(scheduler.rebook_appointments(&[stranger]).unwrap_err().is_value_error());

    assert!(scheduler.rebook_appointments(&[]).unwrap_err().is_value_error());
    assert_eq!(scheduler.appointments(), &before[..]);
}

#[test]
fn test_rebooking_twice_adds_no_second_successor() {
    let mut scheduler = scheduler("max", 12);
    let candidates = without_successor(scheduler.appointments(), 30);
    assert!(!candidates.is_empty());

    let first = scheduler.rebook_appointments(&candidates).unwrap();
    assert!(!first.is_empty());
    let after_first = scheduler.appointments().to_vec();

    // Identifiers were renumbered, so look the originals up again by slot
    let slots: BTreeSet<_> = candidates.iter().map(|a| a.slot_id.clone()).collect();
    let again: Vec<Appointment> = after_first
        .iter()
        .filter(|a| slots.contains(&a.slot_id) && a.rebook_iteration == 0)
        .cloned()
        .collect();
    assert_eq!(again.len(), candidates.len());

    assert!(scheduler.rebook_appointments(&again).unwrap().is_empty());
    assert_eq!(scheduler.appointments(), &after_first[..]);

    // Every failed row has at most one successor
    let mut successors: BTreeMap<&AppointmentId, usize> = BTreeMap::new();
    for origin in after_first.iter().filter_map(|a| a.rebooked_from.as_ref()) {
        *successors.entry(origin).or_default() += 1;
    }
    assert!(successors.values().all(|&n| n == 1));
}

#[test]
fn test_rebook_reads_status_from_the_table() {
    let mut scheduler = scheduler("max", 13);
    let before = scheduler.appointments().to_vec();
    let mut attended = before
        .iter()
        .find(|a| a.status == AppointmentStatus::Attended)
        .cloned()
        .unwrap();
    // A stale copy claiming a failure does not override the table
    attended.status = AppointmentStatus::Cancelled;

    assert!(scheduler.rebook_appointments(&[attended]).unwrap_err().is_value_error());
    assert_eq!(scheduler.appointments(), &before[..]);
}

#[test]
fn test_rebook_before_slots_is_an_error() {
    let mut scheduler = AppointmentScheduler::new(SchedulerConfig {
        date_ranges: vec![("2024-01-01".into(), "2024-03-31".into())],
        ref_date: "2024-03-01".into(),
        ..Default::default()
    })
    .unwrap();
    assert!(scheduler.rebook_appointments(&[]).unwrap_err().is_value_error());
}

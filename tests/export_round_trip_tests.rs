//! CSV export of generated tables and reading them back

use medscheduler::simulation::export::{
    read_appointments, read_patients, read_slots, APPOINTMENTS_FILE, PATIENTS_FILE, SLOTS_FILE,
};
use medscheduler::{AppointmentScheduler, SchedulerConfig};
use std::fs::{self, File};
use tempfile::TempDir;

fn generated(seed: u64) -> AppointmentScheduler {
    let mut scheduler = AppointmentScheduler::new(SchedulerConfig {
        date_ranges: vec![("2024-02-01".into(), "2024-03-31".into())],
        ref_date: "2024-03-15".into(),
        seed: Some(seed),
        ..Default::default()
    })
    .unwrap();
    scheduler.generate().unwrap();
    scheduler
}

#[test]
fn test_tables_survive_a_round_trip() {
    let mut scheduler = generated(31);
    scheduler
        .add_custom_column("region", &["north", "south"], "uniform", None)
        .unwrap();

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("run");
    scheduler.to_csv(&out).unwrap();

    let slots = read_slots(File::open(out.join(SLOTS_FILE)).unwrap()).unwrap();
    let appointments = read_appointments(File::open(out.join(APPOINTMENTS_FILE)).unwrap()).unwrap();
    let patients = read_patients(File::open(out.join(PATIENTS_FILE)).unwrap()).unwrap();

    assert_eq!(slots, scheduler.slots());
    assert_eq!(appointments, scheduler.appointments());
    assert_eq!(patients, scheduler.patients());
    assert!(patients.iter().all(|p| p.custom.contains_key("region")));
}

#[test]
fn test_csv_layout() {
    let scheduler = generated(32);
    let dir = TempDir::new().unwrap();
    scheduler.to_csv(dir.path()).unwrap();

    let appointments = fs::read_to_string(dir.path().join(APPOINTMENTS_FILE)).unwrap();
    let header = appointments.lines().next().unwrap();
    assert!(header.starts_with("appointment_id,slot_id,scheduling_date,scheduling_interval"));
    assert!(header.ends_with("is_first_attendance"));

    let first_row: Vec<&str> = appointments.lines().nth(1).unwrap().split(',').collect();
    // appointment_time column is HH:MM:SS
    let time = first_row[5];
    assert_eq!(time.len(), 8);
    assert_eq!(time.matches(':').count(), 2);

    let patients = fs::read_to_string(dir.path().join(PATIENTS_FILE)).unwrap();
    assert_eq!(patients.lines().next().unwrap(), "patient_id,sex,dob,age,age_group");
    assert_eq!(patients.lines().count(), scheduler.patients().len() + 1);
}

#[test]
fn test_missing_columns_are_value_errors() {
    let slots = "slot_id,appointment_date,appointment_time\n1,2024-01-01,08:00:00\n";
    assert!(read_slots(slots.as_bytes()).unwrap_err().is_value_error());

    let appointments = "appointment_id,slot_id,status\n1,1,attended\n";
    assert!(read_appointments(appointments.as_bytes()).unwrap_err().is_value_error());

    let patients = "patient_id,sex,age\n1,Female,40\n";
    assert!(read_patients(patients.as_bytes()).unwrap_err().is_value_error());
}

#[test]
fn test_malformed_patient_row_is_an_error() {
    let patients = "patient_id,sex,dob,age,age_group\n1,Unknown,1980-01-01,44,40-44\n";
    assert!(read_patients(patients.as_bytes()).is_err());
}

#[test]
fn test_empty_tables_still_get_headers() {
    let mut scheduler = AppointmentScheduler::new(SchedulerConfig {
        date_ranges: vec![("2024-01-01".into(), "2024-01-31".into())],
        ref_date: "2024-01-10".into(),
        ..Default::default()
    })
    .unwrap();
    scheduler.generate_slots();

    let dir = TempDir::new().unwrap();
    scheduler.to_csv(dir.path()).unwrap();

    let appointments = fs::read_to_string(dir.path().join(APPOINTMENTS_FILE)).unwrap();
    assert_eq!(appointments.lines().count(), 1);
    let read_back = read_appointments(appointments.as_bytes()).unwrap();
    assert!(read_back.is_empty());
}

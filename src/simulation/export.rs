//! CSV export and import of the three tables
//!
//! Slots go through their serde representation and appointments through
//! [`AppointmentRow`]; time columns are written as `HH:MM:SS` and dates as
//! `YYYY-MM-DD`. Patients are written record by
//! record because their augmented columns are only known at runtime.
//!
//! Readers check the header row first: a file missing a required column is a value
//! error, raised before any row is parsed.

use csv::StringRecord;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

use crate::appointments::{Appointment, AppointmentRow, APPOINTMENT_COLUMNS};
use crate::calendar::Slot;
use crate::patients::{Patient, PATIENT_COLUMNS};
use crate::simulation::{SchedulerError, SchedulerResult};
use crate::types::PatientId;

/// Columns of the slot table, in export order
pub const SLOT_COLUMNS: [&str; 4] = ["slot_id", "appointment_date", "appointment_time", "is_available"];

/// File names used by [`write_all`]
pub const SLOTS_FILE: &str = "slots.csv";
/// Appointment table file name
pub const APPOINTMENTS_FILE: &str = "appointments.csv";
/// Patient table file name
pub const PATIENTS_FILE: &str = "patients.csv";

fn require_columns(table: &str, headers: &StringRecord, required: &[&str]) -> SchedulerResult<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchedulerError::value_error(format!(
            "{table} table is missing required columns: {}",
            missing.join(", ")
        )))
    }
}

fn write_serialized<T: serde::Serialize, W: Write>(writer: W, rows: &[T], columns: &[&str]) -> SchedulerResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        // headers normally come from the first serialized row
        csv_writer.write_record(columns)?;
    }
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write the slot table
pub fn write_slots<W: Write>(writer: W, slots: &[Slot]) -> SchedulerResult<()> {
    write_serialized(writer, slots, &SLOT_COLUMNS)
}

/// Write the appointment table
pub fn write_appointments<W: Write>(writer: W, appointments: &[Appointment]) -> SchedulerResult<()> {
    let rows: Vec<AppointmentRow> = appointments.iter().map(AppointmentRow::from).collect();
    write_serialized(writer, &rows, &APPOINTMENT_COLUMNS)
}

/// Write the patient table, built-in columns first, then custom columns by name
pub fn write_patients<W: Write>(writer: W, patients: &[Patient]) -> SchedulerResult<()> {
    let custom: Vec<&str> = patients
        .first()
        .map(|p| p.custom.keys().map(String::as_str).collect())
        .unwrap_or_default();
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(PATIENT_COLUMNS.iter().copied().chain(custom.iter().copied()))?;
    for p in patients {
        let mut record = vec![
            p.patient_id.to_string(),
            p.sex.to_string(),
            p.dob.format("%Y-%m-%d").to_string(),
            p.age.to_string(),
            p.age_group.clone(),
        ];
        record.extend(custom.iter().map(|c| p.custom.get(*c).cloned().unwrap_or_default()));
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Read a slot table
pub fn read_slots<R: Read>(reader: R) -> SchedulerResult<Vec<Slot>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    require_columns("Slot", csv_reader.headers()?, &SLOT_COLUMNS)?;
    csv_reader
        .deserialize()
        .map(|row| row.map_err(SchedulerError::from))
        .collect()
}

/// Read an appointment table
pub fn read_appointments<R: Read>(reader: R) -> SchedulerResult<Vec<Appointment>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    require_columns("Appointment", csv_reader.headers()?, &APPOINTMENT_COLUMNS)?;
    csv_reader
        .deserialize::<AppointmentRow>()
        .map(|row| row.map(Appointment::from).map_err(SchedulerError::from))
        .collect()
}

/// Read a patient table; columns beyond the built-in ones become custom columns
pub fn read_patients<R: Read>(reader: R) -> SchedulerResult<Vec<Patient>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    require_columns("Patient", &headers, &PATIENT_COLUMNS)?;
    let index = |name: &str| headers.iter().position(|h| h == name);
    let [Some(id), Some(sex), Some(dob), Some(age), Some(group)] = PATIENT_COLUMNS.map(index) else {
        return Err(SchedulerError::value_error("Patient table header is malformed"));
    };
    let custom: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !PATIENT_COLUMNS.contains(h))
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut patients = Vec::new();
    for (line, record) in csv_reader.records().enumerate() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or("");
        let bad = |column: &str| {
            SchedulerError::value_error(format!(
                "Patient row {} has an invalid {column} '{}'",
                line + 1,
                field(index(column).unwrap_or(0))
            ))
        };
        patients.push(Patient {
            patient_id: PatientId::from_raw(field(id)),
            sex: field(sex).parse().map_err(|_| bad("sex"))?,
            dob: chrono::NaiveDate::parse_from_str(field(dob), "%Y-%m-%d").map_err(|_| bad("dob"))?,
            age: field(age).parse().map_err(|_| bad("age"))?,
            age_group: field(group).to_string(),
            custom: custom
                .iter()
                .map(|(i, name)| (name.clone(), field(*i).to_string()))
                .collect::<BTreeMap<_, _>>(),
        });
    }
    Ok(patients)
}

fn create(path: &Path) -> SchedulerResult<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}

/// Write all three tables into `dir`, creating it if needed
pub fn write_all<P: AsRef<Path>>(
    dir: P,
    slots: &[Slot],
    appointments: &[Appointment],
    patients: &[Patient],
) -> SchedulerResult<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    write_slots(create(&dir.join(SLOTS_FILE))?, slots)?;
    write_appointments(create(&dir.join(APPOINTMENTS_FILE))?, appointments)?;
    write_patients(create(&dir.join(PATIENTS_FILE))?, patients)?;
    info!(
        dir = %dir.display(),
        slots = slots.len(),
        appointments = appointments.len(),
        patients = patients.len(),
        "Wrote CSV tables"
    );
    Ok(())
}

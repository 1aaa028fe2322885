//! Appointment record and table finalization
//!
//! Visit timing is kept as full timestamps so late slots can run past midnight.
//! [`AppointmentRow`] is the flat `HH:MM:SS` form written to and read from CSV.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::simulation::{SchedulerError, SchedulerResult};
use crate::types::{pad_width, AppointmentId, AppointmentStatus, PatientId, Sex, SlotId};

/// Columns every appointment table must carry
pub const APPOINTMENT_COLUMNS: [&str; 19] = [
    "appointment_id",
    "slot_id",
    "scheduling_date",
    "scheduling_interval",
    "appointment_date",
    "appointment_time",
    "status",
    "check_in_time",
    "start_time",
    "end_time",
    "appointment_duration",
    "waiting_time",
    "rebook_iteration",
    "rebooked_from",
    "patient_id",
    "sex",
    "age",
    "age_group",
    "is_first_attendance",
];

/// One scheduled encounter.
///
/// Timing fields are present only for attended appointments; patient fields are
/// filled once patients have been linked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    /// Zero-padded sequence identifier, chronological after finalization
    pub appointment_id: AppointmentId,
    /// Slot consumed by this appointment
    pub slot_id: SlotId,
    /// Day the booking was made
    pub scheduling_date: NaiveDate,
    /// Days between booking and appointment
    pub scheduling_interval: u32,
    /// Slot date
    pub appointment_date: NaiveDate,
    /// Slot start time
    pub appointment_time: NaiveTime,
    /// Outcome, or `scheduled` for future rows
    pub status: AppointmentStatus,
    /// Patient arrival
    pub check_in_time: Option<NaiveDateTime>,
    /// Consultation start, the later of slot time and arrival
    pub start_time: Option<NaiveDateTime>,
    /// Consultation end
    pub end_time: Option<NaiveDateTime>,
    /// Minutes
    pub appointment_duration: Option<u32>,
    /// Minutes between check-in and start
    pub waiting_time: Option<u32>,
    /// 0 for originals, one more per rebooking hop
    pub rebook_iteration: u32,
    /// Appointment this one was rebooked from
    pub rebooked_from: Option<AppointmentId>,
    /// Linked patient
    pub patient_id: Option<PatientId>,
    /// Patient sex
    pub sex: Option<Sex>,
    /// Patient age at the reference date
    pub age: Option<u32>,
    /// Patient age band label
    pub age_group: Option<String>,
    /// Whether this is the patient's first attendance
    pub is_first_attendance: Option<bool>,
}

impl Appointment {
    /// Appointment start as a timestamp
    pub fn datetime(&self) -> NaiveDateTime {
        self.appointment_date.and_time(self.appointment_time)
    }

    /// Whether the row carries a full, consistent set of timing fields
    pub fn has_timing(&self) -> bool {
        self.check_in_time.is_some()
            && self.start_time.is_some()
            && self.end_time.is_some()
            && self.appointment_duration.is_some()
            && self.waiting_time.is_some()
    }

    /// Drop timing fields
    pub fn clear_timing(&mut self) {
        self.check_in_time = None;
        self.start_time = None;
        self.end_time = None;
        self.appointment_duration = None;
        self.waiting_time = None;
    }

    /// Minutes between slot time and arrival (negative = early)
    pub fn check_in_offset_minutes(&self) -> Option<f64> {
        self.check_in_time
            .map(|check_in| (check_in - self.datetime()).num_seconds() as f64 / 60.0)
    }

    /// Drop patient fields
    pub fn clear_patient(&mut self) {
        self.patient_id = None;
        self.sex = None;
        self.age = None;
        self.age_group = None;
        self.is_first_attendance = None;
    }
}

/// Render a time of day as `HH:MM:SS`
pub fn format_hms(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

/// Parse an `HH:MM:SS` time of day
pub fn parse_hms(text: &str) -> SchedulerResult<NaiveTime> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M:%S")
        .map_err(|_| SchedulerError::value_error(format!("Invalid HH:MM:SS time '{text}'")))
}

/// Flat CSV form of an [`Appointment`]: timing columns are `HH:MM:SS` times of day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRow {
    /// See [`Appointment::appointment_id`]
    pub appointment_id: AppointmentId,
    /// See [`Appointment::slot_id`]
    pub slot_id: SlotId,
    /// See [`Appointment::scheduling_date`]
    pub scheduling_date: NaiveDate,
    /// See [`Appointment::scheduling_interval`]
    pub scheduling_interval: u32,
    /// See [`Appointment::appointment_date`]
    pub appointment_date: NaiveDate,
    /// See [`Appointment::appointment_time`]
    pub appointment_time: NaiveTime,
    /// See [`Appointment::status`]
    pub status: AppointmentStatus,
    /// Arrival time of day
    pub check_in_time: Option<NaiveTime>,
    /// Start time of day
    pub start_time: Option<NaiveTime>,
    /// End time of day
    pub end_time: Option<NaiveTime>,
    /// See [`Appointment::appointment_duration`]
    pub appointment_duration: Option<u32>,
    /// See [`Appointment::waiting_time`]
    pub waiting_time: Option<u32>,
    /// See [`Appointment::rebook_iteration`]
    pub rebook_iteration: u32,
    /// See [`Appointment::rebooked_from`]
    pub rebooked_from: Option<AppointmentId>,
    /// See [`Appointment::patient_id`]
    pub patient_id: Option<PatientId>,
    /// See [`Appointment::sex`]
    pub sex: Option<Sex>,
    /// See [`Appointment::age`]
    pub age: Option<u32>,
    /// See [`Appointment::age_group`]
    pub age_group: Option<String>,
    /// See [`Appointment::is_first_attendance`]
    pub is_first_attendance: Option<bool>,
}

/// First instant at or after `anchor` whose time of day is `time`
fn on_or_after(anchor: NaiveDateTime, time: NaiveTime) -> NaiveDateTime {
    let same_day = anchor.date().and_time(time);
    if same_day >= anchor {
        same_day
    } else {
        same_day + Duration::days(1)
    }
}

/// Instant with time of day `time` closest to `anchor`
fn nearest(anchor: NaiveDateTime, time: NaiveTime) -> NaiveDateTime {
    let same_day = anchor.date().and_time(time);
    [same_day - Duration::days(1), same_day, same_day + Duration::days(1)]
        .into_iter()
        .min_by_key(|candidate| (*candidate - anchor).num_seconds().abs())
        .unwrap_or(same_day)
}

impl From<&Appointment> for AppointmentRow {
    fn from(a: &Appointment) -> Self {
        Self {
            appointment_id: a.appointment_id.clone(),
            slot_id: a.slot_id.clone(),
            scheduling_date: a.scheduling_date,
            scheduling_interval: a.scheduling_interval,
            appointment_date: a.appointment_date,
            appointment_time: a.appointment_time,
            status: a.status,
            check_in_time: a.check_in_time.map(|t| t.time()),
            start_time: a.start_time.map(|t| t.time()),
            end_time: a.end_time.map(|t| t.time()),
            appointment_duration: a.appointment_duration,
            waiting_time: a.waiting_time,
            rebook_iteration: a.rebook_iteration,
            rebooked_from: a.rebooked_from.clone(),
            patient_id: a.patient_id.clone(),
            sex: a.sex,
            age: a.age,
            age_group: a.age_group.clone(),
            is_first_attendance: a.is_first_attendance,
        }
    }
}

impl From<AppointmentRow> for Appointment {
    /// Times of day are placed back on the calendar: check-in on the day nearest the
    /// slot, start at or after the slot, end at or after the start.
    fn from(row: AppointmentRow) -> Self {
        let slot = row.appointment_date.and_time(row.appointment_time);
        let check_in_time = row.check_in_time.map(|t| nearest(slot, t));
        let start_time = row.start_time.map(|t| on_or_after(slot, t));
        let end_time = row
            .end_time
            .map(|t| on_or_after(start_time.unwrap_or(slot), t));
        Self {
            appointment_id: row.appointment_id,
            slot_id: row.slot_id,
            scheduling_date: row.scheduling_date,
            scheduling_interval: row.scheduling_interval,
            appointment_date: row.appointment_date,
            appointment_time: row.appointment_time,
            status: row.status,
            check_in_time,
            start_time,
            end_time,
            appointment_duration: row.appointment_duration,
            waiting_time: row.waiting_time,
            rebook_iteration: row.rebook_iteration,
            rebooked_from: row.rebooked_from,
            patient_id: row.patient_id,
            sex: row.sex,
            age: row.age,
            age_group: row.age_group,
            is_first_attendance: row.is_first_attendance,
        }
    }
}

/// Sort the table chronologically and renumber it.
///
/// Rows are ordered by appointment date and time (rebook depth breaks ties), given
/// fresh zero-padded identifiers, and `rebooked_from` references are rewritten to the
/// new identifiers. A reference to an unknown appointment is a value error; the table
/// is left untouched in that case.
pub fn finalize_appointments(appointments: &mut Vec<Appointment>) -> SchedulerResult<()> {
    let known: BTreeSet<&AppointmentId> = appointments.iter().map(|a| &a.appointment_id).collect();
    if known.len() != appointments.len() {
        return Err(SchedulerError::value_error("appointment table has duplicate identifiers"));
    }
    if let Some(orphan) = appointments
        .iter()
        .filter_map(|a| a.rebooked_from.as_ref())
        .find(|origin| !known.contains(origin))
    {
        return Err(SchedulerError::value_error(format!(
            "appointment table references unknown origin appointment '{orphan}'"
        )));
    }

    appointments.sort_by(|a, b| {
        (a.appointment_date, a.appointment_time, a.rebook_iteration, &a.slot_id).cmp(&(
            b.appointment_date,
            b.appointment_time,
            b.rebook_iteration,
            &b.slot_id,
        ))
    });

    let width = pad_width(appointments.len());
    let mut renamed = BTreeMap::new();
    for (i, appointment) in appointments.iter_mut().enumerate() {
        let new_id = AppointmentId::from_sequence(i + 1, width);
        let old_id = std::mem::replace(&mut appointment.appointment_id, new_id.clone());
        renamed.insert(old_id, new_id);
    }
    for appointment in appointments.iter_mut() {
        if let Some(origin) = appointment.rebooked_from.take() {
            appointment.rebooked_from = renamed.get(&origin).cloned();
        }
    }
    Ok(())
}

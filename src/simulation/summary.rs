//! Slot summaries and appointment statistics

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::appointments::Appointment;
use crate::calendar::Slot;
use crate::patients::Patient;
use crate::simulation::{SchedulerError, SchedulerResult};
use crate::types::{AppointmentStatus, ValidatedConfig};

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

/// Overview of a slot table against the calendar it was generated for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSummary {
    /// Earliest slot date
    pub first_date: NaiveDate,
    /// Latest slot date
    pub last_date: NaiveDate,
    /// Day splitting past from future
    pub reference_date: NaiveDate,
    /// Number of slots
    pub total_slots: usize,
    /// Slots not consumed by an appointment
    pub available_slots: usize,
    /// `available_slots / total_slots`
    pub availability_rate: f64,
    /// Slots starting before the reference date
    pub past_slots: usize,
    /// Slots starting on or after the reference date
    pub future_slots: usize,
    /// Weekday index (0 = Monday) to its name and slot count
    pub slots_by_weekday: BTreeMap<u32, (String, usize)>,
    /// Configured working days (0 = Monday)
    pub working_days: Vec<u32>,
    /// Configured working-hour intervals
    pub working_hours: Vec<(u32, u32)>,
    /// Configured slots per hour
    pub appointments_per_hour: u32,
    /// Configured booking horizon in days
    pub booking_horizon: u32,
}

impl SlotSummary {
    /// One-line overview
    pub fn summary(&self) -> String {
        format!(
            "Slots: {} from {} to {} | Available: {} ({:.1}%) | Past: {} | Future: {} (ref {})",
            self.total_slots,
            self.first_date,
            self.last_date,
            self.available_slots,
            self.availability_rate * 100.0,
            self.past_slots,
            self.future_slots,
            self.reference_date
        )
    }
}

impl fmt::Display for SlotSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Slot Summary:")?;
        writeln!(f, "  Period: {} to {}", self.first_date, self.last_date)?;
        writeln!(f, "  Reference Date: {}", self.reference_date)?;
        writeln!(f, "  Total Slots: {}", self.total_slots)?;
        writeln!(
            f,
            "  Available Slots: {} ({:.1}%)",
            self.available_slots,
            self.availability_rate * 100.0
        )?;
        writeln!(f, "  Past / Future: {} / {}", self.past_slots, self.future_slots)?;
        writeln!(f, "  Slots by Weekday:")?;
        for (name, count) in self.slots_by_weekday.values() {
            writeln!(f, "    {name}: {count}")?;
        }
        Ok(())
    }
}

/// Summarize a slot table. An empty table is a value error.
pub fn summarize_slots(slots: &[Slot], config: &ValidatedConfig) -> SchedulerResult<SlotSummary> {
    let (Some(first), Some(last)) = (
        slots.iter().map(|s| s.appointment_date).min(),
        slots.iter().map(|s| s.appointment_date).max(),
    ) else {
        return Err(SchedulerError::value_error("Cannot summarize an empty slot table"));
    };

    let available_slots = slots.iter().filter(|s| s.is_available).count();
    let past_slots = slots.iter().filter(|s| s.datetime() < config.ref_date).count();
    let mut slots_by_weekday: BTreeMap<u32, (String, usize)> = BTreeMap::new();
    for slot in slots {
        let day = slot.appointment_date.weekday();
        slots_by_weekday
            .entry(day.num_days_from_monday())
            .or_insert_with(|| (weekday_name(day).to_string(), 0))
            .1 += 1;
    }

    Ok(SlotSummary {
        first_date: first,
        last_date: last,
        reference_date: config.ref_day(),
        total_slots: slots.len(),
        available_slots,
        availability_rate: available_slots as f64 / slots.len() as f64,
        past_slots,
        future_slots: slots.len() - past_slots,
        slots_by_weekday,
        working_days: config.working_days.clone(),
        working_hours: config.working_hours.clone(),
        appointments_per_hour: config.appointments_per_hour,
        booking_horizon: config.booking_horizon,
    })
}

/// Counts and shares over a finished appointment table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentStatistics {
    /// Number of appointments
    pub total_appointments: usize,
    /// Appointments per status
    pub status_counts: BTreeMap<AppointmentStatus, usize>,
    /// Appointments created by rebooking
    pub rebooked_appointments: usize,
    /// Appointments per rebook depth (0 = original booking)
    pub rebook_depths: BTreeMap<u32, usize>,
    /// Appointments flagged as a patient's first attendance
    pub first_attendances: usize,
    /// Mean check-in offset of attended appointments in minutes (negative = early)
    pub mean_check_in_offset: Option<f64>,
    /// Mean waiting time of attended appointments in minutes
    pub mean_waiting_time: Option<f64>,
    /// Mean consultation duration of attended appointments in minutes
    pub mean_duration: Option<f64>,
    /// Number of patients
    pub total_patients: usize,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

impl AppointmentStatistics {
    /// Collect statistics from the appointment and patient tables
    pub fn from_tables(appointments: &[Appointment], patients: &[Patient]) -> Self {
        let mut stats = Self {
            total_appointments: appointments.len(),
            total_patients: patients.len(),
            ..Default::default()
        };
        for a in appointments {
            *stats.status_counts.entry(a.status).or_insert(0) += 1;
            *stats.rebook_depths.entry(a.rebook_iteration).or_insert(0) += 1;
            if a.rebooked_from.is_some() {
                stats.rebooked_appointments += 1;
            }
            if a.is_first_attendance == Some(true) {
                stats.first_attendances += 1;
            }
        }

        let attended: Vec<&Appointment> = appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Attended)
            .collect();
        stats.mean_check_in_offset =
            mean(attended.iter().filter_map(|a| a.check_in_offset_minutes()));
        stats.mean_waiting_time = mean(attended.iter().filter_map(|a| a.waiting_time.map(f64::from)));
        stats.mean_duration =
            mean(attended.iter().filter_map(|a| a.appointment_duration.map(f64::from)));
        stats
    }

    /// Appointments with `status`
    pub fn status_count(&self, status: AppointmentStatus) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    /// Share of all appointments with `status`, in percent
    pub fn status_percentage(&self, status: AppointmentStatus) -> f64 {
        percentage(self.status_count(status), self.total_appointments)
    }

    /// Appointments with an outcome (everything but `scheduled`)
    pub fn past_appointments(&self) -> usize {
        self.total_appointments - self.status_count(AppointmentStatus::Scheduled)
    }

    /// Attended share of appointments with an outcome, in percent
    pub fn attendance_rate(&self) -> f64 {
        percentage(self.status_count(AppointmentStatus::Attended), self.past_appointments())
    }

    /// Rebooked share of all appointments, in percent
    pub fn rebooked_percentage(&self) -> f64 {
        percentage(self.rebooked_appointments, self.total_appointments)
    }

    /// Appointments per patient
    pub fn average_appointments_per_patient(&self) -> f64 {
        if self.total_patients == 0 {
            0.0
        } else {
            self.total_appointments as f64 / self.total_patients as f64
        }
    }

    /// One-line overview
    pub fn summary(&self) -> String {
        format!(
            "Appointment Summary: {} total | Attended: {} ({:.1}%) | Cancelled: {} ({:.1}%) | DNA: {} ({:.1}%) | Scheduled: {} | Rebooked: {} | Patients: {}",
            self.total_appointments,
            self.status_count(AppointmentStatus::Attended),
            self.status_percentage(AppointmentStatus::Attended),
            self.status_count(AppointmentStatus::Cancelled),
            self.status_percentage(AppointmentStatus::Cancelled),
            self.status_count(AppointmentStatus::DidNotAttend),
            self.status_percentage(AppointmentStatus::DidNotAttend),
            self.status_count(AppointmentStatus::Scheduled),
            self.rebooked_appointments,
            self.total_patients
        )
    }

    /// Multi-line breakdown by status, rebook depth and timing
    pub fn detailed_breakdown(&self) -> String {
        let mut breakdown = String::new();
        breakdown.push_str("=== Appointment Breakdown ===\n");
        breakdown.push_str(&format!("Total Appointments: {}\n\n", self.total_appointments));

        breakdown.push_str("By Status:\n");
        for (status, count) in &self.status_counts {
            breakdown.push_str(&format!(
                "  - {}: {} ({:.1}%)\n",
                status,
                count,
                percentage(*count, self.total_appointments)
            ));
        }

        breakdown.push_str("\nBy Rebook Depth:\n");
        for (depth, count) in &self.rebook_depths {
            breakdown.push_str(&format!("  - {depth}: {count}\n"));
        }

        breakdown.push_str("\nAttended Timing (minutes):\n");
        let fmt_mean = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"));
        breakdown.push_str(&format!("  - Check-in offset: {}\n", fmt_mean(self.mean_check_in_offset)));
        breakdown.push_str(&format!("  - Waiting time: {}\n", fmt_mean(self.mean_waiting_time)));
        breakdown.push_str(&format!("  - Duration: {}\n", fmt_mean(self.mean_duration)));

        breakdown.push_str(&format!(
            "\nPatients: {} ({} first attendances, {:.2} appointments each)\n",
            self.total_patients,
            self.first_attendances,
            self.average_appointments_per_patient()
        ));
        breakdown
    }
}

impl fmt::Display for AppointmentStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.detailed_breakdown())
    }
}

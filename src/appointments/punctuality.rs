//! Check-in and consultation timing for attended appointments
//!
//! Patients arrive at a normally distributed offset from their slot (no clipping, so
//! the tails can reach well outside clinic norms). Consultation starts when both the
//! slot time and the patient have arrived, and lasts a normally distributed number of
//! whole minutes centred on the slot length.

use chrono::{Duration, NaiveDateTime};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::Appointment;
use crate::simulation::{SchedulerError, SchedulerResult};
use crate::types::constants::CHECK_IN_BASE_SD_MINUTES;

/// Timing of one attended appointment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitTiming {
    /// Patient arrival
    pub check_in: NaiveDateTime,
    /// Consultation start
    pub start: NaiveDateTime,
    /// Consultation end
    pub end: NaiveDateTime,
    /// Consultation length in minutes
    pub duration_minutes: u32,
    /// Minutes from arrival to start
    pub waiting_minutes: u32,
}

impl VisitTiming {
    /// Copy the timing onto an appointment row
    pub fn apply_to(&self, appointment: &mut Appointment) {
        appointment.check_in_time = Some(self.check_in);
        appointment.start_time = Some(self.start);
        appointment.end_time = Some(self.end);
        appointment.appointment_duration = Some(self.duration_minutes);
        appointment.waiting_time = Some(self.waiting_minutes);
    }
}

/// Sampler for check-in offsets and consultation durations
#[derive(Debug, Clone)]
pub struct PunctualityModel {
    check_in_offset: Normal<f64>,
    duration: Normal<f64>,
}

impl PunctualityModel {
    /// Build the model.
    ///
    /// Check-in offset ~ Normal(`check_in_mean`, 10 × (1 + `noise`)) minutes;
    /// duration ~ Normal(`slot_minutes`, `slot_minutes` × `noise`) minutes.
    pub fn new(check_in_mean: f64, noise: f64, slot_minutes: u32) -> SchedulerResult<Self> {
        let slot_minutes = f64::from(slot_minutes);
        let check_in_offset = Normal::new(check_in_mean, CHECK_IN_BASE_SD_MINUTES * (1.0 + noise))
            .map_err(|e| SchedulerError::value_error(format!("Invalid check-in distribution: {e}")))?;
        let duration = Normal::new(slot_minutes, slot_minutes * noise)
            .map_err(|e| SchedulerError::value_error(format!("Invalid duration distribution: {e}")))?;
        Ok(Self {
            check_in_offset,
            duration,
        })
    }

    /// Draw a check-in offset in minutes (negative = early)
    pub fn sample_offset_minutes<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.check_in_offset.sample(rng)
    }

    /// Draw a check-in timestamp for a slot, rounded to the second
    pub fn sample_check_in<R: Rng + ?Sized>(&self, scheduled: NaiveDateTime, rng: &mut R) -> NaiveDateTime {
        let offset_seconds = (self.sample_offset_minutes(rng) * 60.0).round() as i64;
        scheduled + Duration::seconds(offset_seconds)
    }

    /// Simulate arrival, start and end of an attended appointment
    pub fn simulate<R: Rng + ?Sized>(&self, scheduled: NaiveDateTime, rng: &mut R) -> VisitTiming {
        let check_in = self.sample_check_in(scheduled, rng);
        let duration_minutes = self.duration.sample(rng).round().max(1.0) as u32;
        let start = scheduled.max(check_in);
        let end = start + Duration::minutes(i64::from(duration_minutes));
        let waiting_minutes = ((start - check_in).num_seconds() as f64 / 60.0).round() as u32;
        VisitTiming {
            check_in,
            start,
            end,
            duration_minutes,
            waiting_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn nine_am() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_start_never_precedes_slot_or_arrival() {
        let model = PunctualityModel::new(-10.0, 0.1, 15).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1_000 {
            let timing = model.simulate(nine_am(), &mut rng);
            assert!(timing.start >= nine_am());
            assert!(timing.start >= timing.check_in);
            assert_eq!(timing.end - timing.start, Duration::minutes(i64::from(timing.duration_minutes)));
            assert!(timing.duration_minutes >= 1);
        }
    }

    #[test]
    fn test_offsets_are_unclipped() {
        let model = PunctualityModel::new(-10.0, 0.5, 15).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let offsets: Vec<f64> = (0..20_000).map(|_| model.sample_offset_minutes(&mut rng)).collect();
        let min = offsets.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = offsets.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        // sd is 15 minutes, so 20k draws reach beyond 3.5 sd on both sides
        assert!(min < -10.0 - 45.0, "min {min}");
        assert!(max > -10.0 + 45.0, "max {max}");
        let mean = offsets.iter().sum::<f64>() / offsets.len() as f64;
        assert!((mean + 10.0).abs() < 0.5);
    }

    #[test]
    fn test_zero_noise_duration_is_slot_length() {
        let model = PunctualityModel::new(0.0, 0.0, 20).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let timing = model.simulate(nine_am(), &mut rng);
        assert_eq!(timing.duration_minutes, 20);
    }

    #[test]
    fn test_negative_noise_is_rejected() {
        assert!(PunctualityModel::new(0.0, -2.0, 15).is_err());
    }
}

//! Appointment generation
//!
//! Booking happens in two passes over the slot table:
//!
//! 1. **Past slots** (before the reference date) are booked at the fill rate by
//!    calendar-weighted sampling without replacement, so seasonally busier dates are
//!    over-represented. Each booking draws a lead time, an outcome status and, for
//!    attended rows, check-in and consultation timing.
//! 2. **Future slots** inside the booking horizon are booked with probability
//!    `fill_rate × P(lead ≥ days ahead)`: a slot far in the future is less likely to
//!    have been booked yet. These rows carry the `scheduled` status.
//!
//! Future slots beyond the horizon stay available.

use chrono::{NaiveDate, NaiveDateTime};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::index::sample_weighted;
use rand::Rng;
use tracing::{debug, info, instrument};

use super::{scheduling_date_for, Appointment, LeadTimeDistribution, PunctualityModel};
use crate::calendar::Slot;
use crate::simulation::{SchedulerError, SchedulerResult};
use crate::types::{AppointmentId, AppointmentStatus, ValidatedConfig};

/// Samplers shared by booking and rebooking
#[derive(Debug, Clone)]
pub struct AppointmentGenerator<'a> {
    pub(crate) config: &'a ValidatedConfig,
    pub(crate) lead_time: LeadTimeDistribution,
    pub(crate) punctuality: PunctualityModel,
    status_index: WeightedIndex<f64>,
    next_sequence: usize,
}

impl<'a> AppointmentGenerator<'a> {
    /// Build the samplers for a validated configuration
    pub fn new(config: &'a ValidatedConfig) -> SchedulerResult<Self> {
        let status_index = WeightedIndex::new(config.status_rates.as_array())
            .map_err(|e| SchedulerError::value_error(format!("Invalid status rates: {e}")))?;
        Ok(Self {
            config,
            lead_time: LeadTimeDistribution::fit(config.booking_horizon, config.median_lead_time),
            punctuality: PunctualityModel::new(
                config.check_in_time_mean,
                config.noise,
                config.slot_duration_min(),
            )?,
            status_index,
            next_sequence: 0,
        })
    }

    /// Continue numbering after an existing table of `len` rows
    pub fn starting_after(mut self, len: usize) -> Self {
        self.next_sequence = len;
        self
    }

    /// The fitted lead-time distribution
    pub fn lead_time(&self) -> &LeadTimeDistribution {
        &self.lead_time
    }

    /// Draw an outcome status from the configured rates
    pub fn draw_status<R: Rng + ?Sized>(&self, rng: &mut R) -> AppointmentStatus {
        AppointmentStatus::OUTCOMES[self.status_index.sample(rng)]
    }

    /// Set status (and timing) on existing rows.
    ///
    /// Rows before the reference date get a drawn outcome, rows on or after it are
    /// `scheduled`. Attended rows get fresh timing, all others have timing cleared.
    pub fn assign_status<R: Rng + ?Sized>(&self, rows: &mut [Appointment], rng: &mut R) {
        for row in rows.iter_mut() {
            self.settle(row, rng);
        }
    }

    fn settle<R: Rng + ?Sized>(&self, row: &mut Appointment, rng: &mut R) {
        row.clear_timing();
        if row.datetime() >= self.config.ref_date {
            row.status = AppointmentStatus::Scheduled;
            return;
        }
        row.status = self.draw_status(rng);
        if row.status == AppointmentStatus::Attended {
            self.punctuality.simulate(row.datetime(), rng).apply_to(row);
        }
    }

    /// Pick `count` distinct available past slots, weighted by calendar weight.
    ///
    /// Returns slot-table indices in chronological order. Slots are not consumed.
    pub fn sample_past_slots<R: Rng + ?Sized>(
        &self,
        slots: &[Slot],
        count: usize,
        rng: &mut R,
    ) -> SchedulerResult<Vec<usize>> {
        let candidates: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_available && s.datetime() < self.config.ref_date)
            .map(|(i, _)| i)
            .collect();
        if count > candidates.len() {
            return Err(SchedulerError::value_error(format!(
                "Cannot sample {count} past slots, only {} are available",
                candidates.len()
            )));
        }
        if count == 0 {
            return Ok(Vec::new());
        }
        let weights: Vec<f64> = candidates
            .iter()
            .map(|&i| self.config.calendar.raw_weight(slots[i].appointment_date))
            .collect();
        let chosen = sample_weighted(rng, candidates.len(), |i| weights[i], count)
            .map_err(|e| SchedulerError::value_error(format!("Weighted slot sampling failed: {e}")))?;
        let mut picked: Vec<usize> = chosen.into_iter().map(|i| candidates[i]).collect();
        picked.sort_unstable();
        Ok(picked)
    }

    /// Book the slot table: past slots at the fill rate, future slots inside the horizon
    /// by lead-time survival. Consumed slots are flipped to unavailable.
    #[instrument(skip(self, slots, rng), fields(slots = slots.len()))]
    pub fn generate<R: Rng + ?Sized>(
        &mut self,
        slots: &mut [Slot],
        rng: &mut R,
    ) -> SchedulerResult<Vec<Appointment>> {
        let past_available = slots
            .iter()
            .filter(|s| s.is_available && s.datetime() < self.config.ref_date)
            .count();
        let target = (self.config.fill_rate * past_available as f64).round() as usize;
        let past = self.sample_past_slots(slots, target.min(past_available), rng)?;
        debug!(past_available, target, "Sampled past slots");

        let mut appointments = Vec::with_capacity(past.len());
        for index in past {
            let slot = &mut slots[index];
            slot.consume();
            let lead = self.lead_time.sample(rng);
            let mut appointment = self.book(slot, lead);
            self.settle(&mut appointment, rng);
            appointments.push(appointment);
        }
        let past_booked = appointments.len();

        let ref_day = self.config.ref_day();
        let horizon = self.config.booking_horizon;
        for slot in slots.iter_mut() {
            if !slot.is_available || slot.datetime() < self.config.ref_date {
                continue;
            }
            let days_ahead = (slot.appointment_date - ref_day).num_days();
            if days_ahead < 0 || days_ahead > i64::from(horizon) {
                continue;
            }
            let days_ahead = days_ahead as u32;
            let probability = self.config.fill_rate * self.lead_time.survival(days_ahead);
            if rng.gen::<f64>() >= probability {
                continue;
            }
            let Some(lead) = self.lead_time.sample_at_least(days_ahead, rng) else {
                continue;
            };
            slot.consume();
            let mut appointment = self.book(slot, lead);
            appointment.status = AppointmentStatus::Scheduled;
            appointments.push(appointment);
        }

        info!(
            past = past_booked,
            future = appointments.len() - past_booked,
            "Generated appointments"
        );
        Ok(appointments)
    }

    /// New appointment row for a slot booked `lead` days ahead; status is provisional
    pub(crate) fn book(&mut self, slot: &Slot, lead: u32) -> Appointment {
        let (scheduling_date, scheduling_interval) =
            scheduling_date_for(slot.appointment_date, lead, self.config.first_date());
        self.row(slot, scheduling_date, scheduling_interval)
    }

    pub(crate) fn row(
        &mut self,
        slot: &Slot,
        scheduling_date: NaiveDate,
        scheduling_interval: u32,
    ) -> Appointment {
        self.next_sequence += 1;
        Appointment {
            appointment_id: AppointmentId::from_sequence(self.next_sequence, 0),
            slot_id: slot.slot_id.clone(),
            scheduling_date,
            scheduling_interval,
            appointment_date: slot.appointment_date,
            appointment_time: slot.appointment_time,
            status: AppointmentStatus::Scheduled,
            check_in_time: None,
            start_time: None,
            end_time: None,
            appointment_duration: None,
            waiting_time: None,
            rebook_iteration: 0,
            rebooked_from: None,
            patient_id: None,
            sex: None,
            age: None,
            age_group: None,
            is_first_attendance: None,
        }
    }

    /// Simulated arrival for a slot start
    pub fn check_in_time<R: Rng + ?Sized>(&self, scheduled: NaiveDateTime, rng: &mut R) -> NaiveDateTime {
        self.punctuality.sample_check_in(scheduled, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::generate_slots;
    use crate::types::SchedulerConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> ValidatedConfig {
        SchedulerConfig {
            date_ranges: vec![("2024-01-01".into(), "2024-06-30".into())],
            ref_date: "2024-06-01".into(),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn test_past_fill_rate_and_consumption() {
        let config = config();
        let mut slots = generate_slots(&config);
        let past_total = slots.iter().filter(|s| s.datetime() < config.ref_date).count();
        let mut generator = AppointmentGenerator::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let appointments = generator.generate(&mut slots, &mut rng).unwrap();

        let past = appointments
            .iter()
            .filter(|a| a.status != AppointmentStatus::Scheduled)
            .count();
        assert_eq!(past, (0.9 * past_total as f64).round() as usize);
        let consumed = slots.iter().filter(|s| !s.is_available).count();
        assert_eq!(consumed, appointments.len());
    }

    #[test]
    fn test_future_rows_are_scheduled_within_horizon() {
        let config = config();
        let mut slots = generate_slots(&config);
        let mut generator = AppointmentGenerator::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let appointments = generator.generate(&mut slots, &mut rng).unwrap();

        let future: Vec<&Appointment> = appointments
            .iter()
            .filter(|a| a.datetime() >= config.ref_date)
            .collect();
        assert!(!future.is_empty());
        for a in future {
            assert_eq!(a.status, AppointmentStatus::Scheduled);
            assert!(a.appointment_date <= config.horizon_end());
            assert!(a.scheduling_date <= config.ref_day());
            assert!(!a.has_timing());
        }
    }

    #[test]
    fn test_timing_only_on_attended_rows() {
        let config = config();
        let mut slots = generate_slots(&config);
        let mut generator = AppointmentGenerator::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        for a in generator.generate(&mut slots, &mut rng).unwrap() {
            assert_eq!(a.has_timing(), a.status == AppointmentStatus::Attended);
            assert!(a.scheduling_date <= a.appointment_date);
            assert!(a.scheduling_date >= config.first_date());
            assert_eq!(
                (a.appointment_date - a.scheduling_date).num_days(),
                i64::from(a.scheduling_interval)
            );
        }
    }

    #[test]
    fn test_weighted_sampling_prefers_heavy_dates() {
        let mut weekday: std::collections::BTreeMap<u32, f64> = (0..7).map(|d| (d, 1.0)).collect();
        weekday.insert(0, 10.0);
        let config = SchedulerConfig {
            date_ranges: vec![("2024-01-01".into(), "2024-06-30".into())],
            ref_date: "2024-06-01".into(),
            weekday_weights: Some(weekday),
            ..Default::default()
        }
        .validate()
        .unwrap();
        let slots = generate_slots(&config);
        let generator = AppointmentGenerator::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let picked = generator.sample_past_slots(&slots, 500, &mut rng).unwrap();
        assert_eq!(picked.len(), 500);
        assert!(slots.iter().all(|s| s.is_available));

        let mondays = picked
            .iter()
            .filter(|&&i| chrono::Datelike::weekday(&slots[i].appointment_date) == chrono::Weekday::Mon)
            .count();
        assert!(mondays > 250, "mondays {mondays}");
    }

    #[test]
    fn test_oversampling_is_an_error() {
        let config = config();
        let slots = generate_slots(&config);
        let generator = AppointmentGenerator::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generator
            .sample_past_slots(&slots, slots.len() + 1, &mut rng)
            .unwrap_err()
            .is_value_error());
    }
}

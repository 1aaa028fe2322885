//! Rebooking of cancelled and missed appointments
//!
//! Each failed appointment is rebooked with the category's ratio. The successor is
//! booked on the day of the failure for the same patient, on the first free slot at
//! least one lead-time draw later and still inside the booking horizon. Successors that
//! fail again are queued for another round until the category's depth cap is reached.

use chrono::{Duration, NaiveDate};
use rand::Rng;
use std::collections::VecDeque;
use tracing::{debug, info, instrument, warn};

use super::{Appointment, AppointmentGenerator};
use crate::calendar::Slot;
use crate::simulation::{SchedulerError, SchedulerResult};

impl AppointmentGenerator<'_> {
    /// Rebook failed appointments, consuming slots for the successors.
    ///
    /// Every candidate must be cancelled or did-not-attend. Returns only the new rows;
    /// the candidates themselves are never modified.
    #[instrument(skip(self, slots, candidates, rng), fields(candidates = candidates.len()))]
    pub fn rebook<R: Rng + ?Sized>(
        &mut self,
        slots: &mut [Slot],
        candidates: &[Appointment],
        rng: &mut R,
    ) -> SchedulerResult<Vec<Appointment>> {
        if let Some(bad) = candidates.iter().find(|a| !a.status.is_rebookable()) {
            return Err(SchedulerError::value_error(format!(
                "Appointment {} has status '{}' and cannot be rebooked",
                bad.appointment_id, bad.status
            )));
        }

        let category = self.config.rebook_category;
        let cap = category.max_iterations();
        let ratio = category.rebook_ratio();
        let mut queue: VecDeque<Appointment> = candidates.iter().cloned().collect();
        let mut successors = Vec::new();
        let mut no_slot = 0usize;

        while let Some(failed) = queue.pop_front() {
            if failed.rebook_iteration >= cap || rng.gen::<f64>() >= ratio {
                continue;
            }
            let Some(successor) = self.successor_of(&failed, slots, rng) else {
                no_slot += 1;
                continue;
            };
            if successor.status.is_rebookable() && successor.rebook_iteration < cap {
                queue.push_back(successor.clone());
            }
            successors.push(successor);
        }

        if no_slot > 0 {
            warn!(no_slot, "Some rebookings found no free slot inside the booking horizon");
        }
        info!(
            category = %category,
            rebooked = successors.len(),
            "Rebooked failed appointments"
        );
        Ok(successors)
    }

    fn successor_of<R: Rng + ?Sized>(
        &mut self,
        failed: &Appointment,
        slots: &mut [Slot],
        rng: &mut R,
    ) -> Option<Appointment> {
        let scheduling_date = failed.appointment_date;
        let lead = self
            .lead_time
            .sample_at_least(1, rng)
            .unwrap_or(1)
            .max(1);
        let ahead = |days: u32| {
            scheduling_date
                .checked_add_signed(Duration::days(i64::from(days)))
                .unwrap_or(NaiveDate::MAX)
        };
        let earliest = ahead(lead);
        let latest = ahead(self.config.booking_horizon);

        let start = slots.partition_point(|s| s.appointment_date < earliest);
        let index = slots[start..]
            .iter()
            .take_while(|s| s.appointment_date <= latest)
            .position(|s| s.is_available)
            .map(|offset| start + offset)?;

        let slot = &mut slots[index];
        slot.consume();
        let interval = (slot.appointment_date - scheduling_date).num_days() as u32;
        let mut successor = self.row(slot, scheduling_date, interval);
        successor.rebook_iteration = failed.rebook_iteration + 1;
        successor.rebooked_from = Some(failed.appointment_id.clone());
        successor.patient_id = failed.patient_id.clone();
        successor.sex = failed.sex;
        successor.age = failed.age;
        successor.age_group = failed.age_group.clone();
        successor.is_first_attendance = failed.is_first_attendance;
        self.assign_status(std::slice::from_mut(&mut successor), rng);

        debug!(
            from = %failed.appointment_id,
            date = %successor.appointment_date,
            iteration = successor.rebook_iteration,
            "Rebooked appointment"
        );
        Some(successor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::generate_slots;
    use crate::types::{AppointmentStatus, SchedulerConfig, ValidatedConfig};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config(category: &str) -> ValidatedConfig {
        SchedulerConfig {
            date_ranges: vec![("2024-01-01".into(), "2024-06-30".into())],
            ref_date: "2024-06-01".into(),
            rebook_category: category.into(),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn run(category: &str, seed: u64) -> (Vec<Appointment>, Vec<Appointment>) {
        let config = config(category);
        let mut slots = generate_slots(&config);
        let mut generator = AppointmentGenerator::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let originals = generator.generate(&mut slots, &mut rng).unwrap();
        let failed: Vec<Appointment> = originals
            .iter()
            .filter(|a| a.status.is_rebookable())
            .cloned()
            .collect();
        let successors = generator.rebook(&mut slots, &failed, &mut rng).unwrap();
        (originals, successors)
    }

    #[test]
    fn test_depth_bounded_by_category() {
        for (category, cap) in [("min", 1), ("med", 2), ("max", 10)] {
            let (_, successors) = run(category, 42);
            assert!(!successors.is_empty(), "{category} produced no rebookings");
            assert!(successors.iter().all(|a| a.rebook_iteration >= 1 && a.rebook_iteration <= cap));
        }
    }

    #[test]
    fn test_successors_follow_their_origin() {
        let (originals, successors) = run("max", 7);
        let all: Vec<&Appointment> = originals.iter().chain(&successors).collect();
        for successor in &successors {
            let origin_id = successor.rebooked_from.as_ref().unwrap();
            let origin = all.iter().find(|a| &a.appointment_id == origin_id).unwrap();
            assert!(origin.status.is_rebookable());
            assert_eq!(successor.scheduling_date, origin.appointment_date);
            assert!(successor.appointment_date > origin.appointment_date);
            assert_eq!(successor.rebook_iteration, origin.rebook_iteration + 1);
            if successor.datetime() >= config("max").ref_date {
                assert_eq!(successor.status, AppointmentStatus::Scheduled);
            }
        }
    }

    #[test]
    fn test_rebooking_consumes_distinct_slots() {
        let (originals, successors) = run("med", 3);
        let mut slot_ids: Vec<_> = originals.iter().chain(&successors).map(|a| a.slot_id.clone()).collect();
        let total = slot_ids.len();
        slot_ids.sort();
        slot_ids.dedup();
        assert_eq!(slot_ids.len(), total);
    }

    #[test]
    fn test_rejects_non_rebookable_candidates() {
        let config = config("med");
        let mut slots = generate_slots(&config);
        let mut generator = AppointmentGenerator::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let originals = generator.generate(&mut slots, &mut rng).unwrap();
        let attended: Vec<Appointment> = originals
            .into_iter()
            .filter(|a| a.status == AppointmentStatus::Attended)
            .take(1)
            .collect();
        assert!(generator
            .rebook(&mut slots, &attended, &mut rng)
            .unwrap_err()
            .is_value_error());
    }
}

//! Scheduling pipeline
//!
//! [`AppointmentScheduler`] owns the validated configuration, the single random
//! number generator and the three tables. Stages run in order (slots, appointments
//! with rebooking, patients) and each stage either replaces its table completely or
//! fails without touching any table.

use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::appointments::{
    finalize_appointments, Appointment, AppointmentGenerator, LeadTimeDistribution,
    PunctualityModel,
};
use crate::calendar::{generate_slots, Slot};
use crate::patients::{add_custom_column, Patient, PatientGenerator};
use crate::simulation::{
    export, summarize_slots, AppointmentStatistics, SchedulerError, SchedulerResult, SlotSummary,
};
use crate::types::{AppointmentId, SchedulerConfig, SlotId, ValidatedConfig};

/// Pipeline owner for one synthetic dataset
#[derive(Debug)]
pub struct AppointmentScheduler {
    config: ValidatedConfig,
    rng: StdRng,
    slots: Option<Vec<Slot>>,
    appointments: Vec<Appointment>,
    patients: Vec<Patient>,
}

impl AppointmentScheduler {
    /// Validate `config` and seed the generator
    #[instrument(skip(config), fields(seed = ?config.seed))]
    pub fn new(config: SchedulerConfig) -> SchedulerResult<Self> {
        let config = config.validate()?;
        Ok(Self::from_validated(config))
    }

    /// Build from an already validated configuration
    pub fn from_validated(config: ValidatedConfig) -> Self {
        let rng = if let Some(seed) = config.seed {
            info!("Using deterministic seed: {}", seed);
            StdRng::seed_from_u64(seed)
        } else {
            debug!("Using entropy-based random seed");
            StdRng::from_entropy()
        };
        info!(
            ranges = config.date_ranges.len(),
            ref_date = %config.ref_date,
            fill_rate = config.fill_rate,
            "Initialized appointment scheduler"
        );
        Self {
            config,
            rng,
            slots: None,
            appointments: Vec::new(),
            patients: Vec::new(),
        }
    }

    /// The validated configuration
    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    /// Slot table; empty until [`generate_slots`](Self::generate_slots) has run
    pub fn slots(&self) -> &[Slot] {
        self.slots.as_deref().unwrap_or(&[])
    }

    /// Appointment table
    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    /// Patient table
    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    /// Minutes per slot
    pub fn slot_duration_min(&self) -> u32 {
        self.config.slot_duration_min()
    }

    /// Build the slot table. Appointments and patients from an earlier run are dropped.
    pub fn generate_slots(&mut self) -> &[Slot] {
        let slots = generate_slots(&self.config);
        crate::stage_event!(info, "slots", "Slot table ready", slots = slots.len());
        self.appointments.clear();
        self.patients.clear();
        self.slots.insert(slots)
    }

    fn require_slots(&self) -> SchedulerResult<&[Slot]> {
        match self.slots.as_deref() {
            None => Err(SchedulerError::value_error(
                "Slots have not been generated; call generate_slots() first",
            )),
            Some([]) => Err(SchedulerError::value_error(
                "Slot table is empty; no appointments can be booked",
            )),
            Some(slots) => Ok(slots),
        }
    }

    /// Book the slot table, rebook failed appointments and finalize the result.
    ///
    /// Every slot is treated as free at the start, so repeated calls replace the
    /// previous appointment table. Patients are dropped.
    #[instrument(skip(self))]
    pub fn generate_appointments(&mut self) -> SchedulerResult<&[Appointment]> {
        let mut slots = self.require_slots()?.to_vec();
        for slot in slots.iter_mut() {
            slot.is_available = true;
        }

        let mut generator = AppointmentGenerator::new(&self.config)?;
        let mut appointments = generator.generate(&mut slots, &mut self.rng)?;
        let failed: Vec<Appointment> = appointments
            .iter()
            .filter(|a| a.status.is_rebookable())
            .cloned()
            .collect();
        if !failed.is_empty() {
            let successors = generator.rebook(&mut slots, &failed, &mut self.rng)?;
            appointments.extend(successors);
        }
        finalize_appointments(&mut appointments)?;
        crate::stage_event!(
            info,
            "appointments",
            "Appointment table ready",
            appointments = appointments.len(),
            rebooked_from = failed.len(),
        );

        self.slots = Some(slots);
        self.appointments = appointments;
        self.patients.clear();
        Ok(&self.appointments)
    }

    /// Rebook specific failed appointments from the current table.
    ///
    /// Candidates are matched by identifier and read back from the table, so the
    /// table's status and depth decide, not the caller's copy. Every candidate must
    /// be cancelled or did-not-attend. Candidates that already have a successor are
    /// skipped, which makes a repeated call a no-op for them. Successors inherit the
    /// candidate's patient and, like pipeline rebookings, do not count toward the
    /// per-patient visit cap. The table is re-finalized, so identifiers change; the
    /// returned rows carry the new ones.
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub fn rebook_appointments(&mut self, candidates: &[Appointment]) -> SchedulerResult<Vec<Appointment>> {
        self.require_slots()?;
        if candidates.is_empty() {
            return Err(SchedulerError::value_error("No appointments given to rebook"));
        }

        let pending = {
            let by_id: BTreeMap<&AppointmentId, &Appointment> = self
                .appointments
                .iter()
                .map(|a| (&a.appointment_id, a))
                .collect();
            let rebooked: BTreeSet<&AppointmentId> = self
                .appointments
                .iter()
                .filter_map(|a| a.rebooked_from.as_ref())
                .collect();
            let mut seen = BTreeSet::new();
            let mut pending = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                let Some(row) = by_id.get(&candidate.appointment_id) else {
                    return Err(SchedulerError::value_error(format!(
                        "Appointment {} is not in the appointment table",
                        candidate.appointment_id
                    )));
                };
                if rebooked.contains(&row.appointment_id) || !seen.insert(&row.appointment_id) {
                    continue;
                }
                pending.push((*row).clone());
            }
            pending
        };
        if pending.len() < candidates.len() {
            debug!(
                skipped = candidates.len() - pending.len(),
                "Skipping candidates that already have a successor"
            );
        }
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let mut slots = self.require_slots()?.to_vec();
        let mut generator =
            AppointmentGenerator::new(&self.config)?.starting_after(self.appointments.len());
        let successors = generator.rebook(&mut slots, &pending, &mut self.rng)?;
        crate::stage_event!(info, "rebooking", "Rebooked candidates", successors = successors.len());
        let new_slots: BTreeSet<SlotId> = successors.iter().map(|a| a.slot_id.clone()).collect();

        let mut appointments = self.appointments.clone();
        appointments.extend(successors);
        finalize_appointments(&mut appointments)?;

        self.slots = Some(slots);
        self.appointments = appointments;
        Ok(self
            .appointments
            .iter()
            .filter(|a| new_slots.contains(&a.slot_id))
            .cloned()
            .collect())
    }

    /// Replace the patient table with `total` standalone patients.
    ///
    /// Appointments lose their patient links.
    pub fn generate_patients(&mut self, total: usize) -> SchedulerResult<&[Patient]> {
        let patients = PatientGenerator::new(&self.config)?.generate(total, &mut self.rng)?;
        crate::stage_event!(info, "patients", "Standalone patient table ready", patients = total);
        for appointment in self.appointments.iter_mut() {
            appointment.clear_patient();
        }
        self.patients = patients;
        Ok(&self.patients)
    }

    /// Draw status (and timing) for caller-supplied rows
    pub fn assign_status(&mut self, rows: &mut [Appointment]) -> SchedulerResult<()> {
        AppointmentGenerator::new(&self.config)?.assign_status(rows, &mut self.rng);
        Ok(())
    }

    /// Simulated arrival time for an appointment starting at `scheduled`
    pub fn generate_check_in_time(&mut self, scheduled: NaiveDateTime) -> SchedulerResult<NaiveDateTime> {
        let model = PunctualityModel::new(
            self.config.check_in_time_mean,
            self.config.noise,
            self.config.slot_duration_min(),
        )?;
        Ok(model.sample_check_in(scheduled, &mut self.rng))
    }

    /// Lead-time distribution over `0..=max_interval` fitted to the configured median
    pub fn lead_time_pmf(&self, max_interval: u32) -> LeadTimeDistribution {
        LeadTimeDistribution::fit(max_interval, self.config.median_lead_time)
    }

    /// Month weight times weekday weight for a date
    pub fn date_weight_raw(&self, date: NaiveDate) -> f64 {
        self.config.calendar.raw_weight(date)
    }

    /// Preview `n` calendar-weighted past slots without booking them.
    ///
    /// With a configured seed the draw comes from a generator seeded the same way as
    /// the pipeline, so repeated calls agree and the pipeline's own stream is unaffected.
    pub fn weighted_sample_past_slots(&self, n: usize) -> SchedulerResult<Vec<Slot>> {
        let slots = self.require_slots()?;
        let mut probe = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let picked = AppointmentGenerator::new(&self.config)?.sample_past_slots(slots, n, &mut probe)?;
        Ok(picked.into_iter().map(|i| slots[i].clone()).collect())
    }

    /// Add a categorical column to the patient table
    pub fn add_custom_column<S: AsRef<str>>(
        &mut self,
        name: &str,
        categories: &[S],
        distribution_type: &str,
        custom_probs: Option<&[f64]>,
    ) -> SchedulerResult<()> {
        add_custom_column(
            &mut self.patients,
            name,
            categories,
            distribution_type,
            custom_probs,
            &mut self.rng,
        )
    }

    /// Run every stage: slots, appointments (with rebooking), then patient linkage
    #[instrument(skip(self))]
    pub fn generate(&mut self) -> SchedulerResult<()> {
        self.generate_slots();
        self.generate_appointments()?;

        let mut appointments = self.appointments.clone();
        let patients = PatientGenerator::new(&self.config)?.link(&mut appointments, &mut self.rng)?;
        self.appointments = appointments;
        self.patients = patients;

        info!(
            slots = self.slots().len(),
            appointments = self.appointments.len(),
            patients = self.patients.len(),
            "Generation complete"
        );
        Ok(())
    }

    /// Summary of the slot table
    pub fn summarize_slots(&self) -> SchedulerResult<SlotSummary> {
        summarize_slots(self.slots(), &self.config)
    }

    /// Statistics of the appointment and patient tables
    pub fn statistics(&self) -> AppointmentStatistics {
        AppointmentStatistics::from_tables(&self.appointments, &self.patients)
    }

    /// Write `slots.csv`, `appointments.csv` and `patients.csv` into `dir`
    pub fn to_csv<P: AsRef<Path>>(&self, dir: P) -> SchedulerResult<()> {
        export::write_all(dir, self.slots(), &self.appointments, &self.patients)
    }
}

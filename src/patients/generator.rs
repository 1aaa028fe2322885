//! Patient synthesis and appointment linkage
//!
//! Patients are drawn from the age-band by sex table: a band is picked by its weight
//! inside the age cutoffs, the age is uniform within the (clipped) band, and the sex
//! follows the band's female/male split. Birth dates are back-computed from the age at
//! the reference date.
//!
//! Linkage walks root appointments chronologically. Each one is a first attendance
//! (a new patient) with the configured probability, otherwise a follow-up for a
//! uniformly chosen existing patient still under the visit cap. Rebooked appointments
//! inherit the patient of the appointment they replace.

use chrono::{Datelike, Duration, Months, NaiveDate};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use super::age_table::age_group_label;
use crate::appointments::Appointment;
use crate::simulation::{SchedulerError, SchedulerResult};
use crate::types::{pad_width, AppointmentId, PatientId, Sex, ValidatedConfig};

/// Built-in patient columns, in export order
pub const PATIENT_COLUMNS: [&str; 5] = ["patient_id", "sex", "dob", "age", "age_group"];

/// One synthesized individual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Zero-padded sequence identifier
    pub patient_id: PatientId,
    /// Sex drawn from the reference table
    pub sex: Sex,
    /// Date of birth
    pub dob: NaiveDate,
    /// Age in whole years at the reference date
    pub age: u32,
    /// Age-group label
    pub age_group: String,
    /// Augmented categorical columns
    #[serde(default)]
    pub custom: BTreeMap<String, String>,
}

/// Demographics of a patient before an identifier is assigned
#[derive(Debug, Clone, PartialEq)]
struct Demographics {
    sex: Sex,
    dob: NaiveDate,
    age: u32,
    age_group: String,
}

impl Demographics {
    fn into_patient(self, patient_id: PatientId) -> Patient {
        Patient {
            patient_id,
            sex: self.sex,
            dob: self.dob,
            age: self.age,
            age_group: self.age_group,
            custom: BTreeMap::new(),
        }
    }
}

/// Whole years between `dob` and `on`
pub fn age_on(dob: NaiveDate, on: NaiveDate) -> u32 {
    let mut years = on.year() - dob.year();
    if (on.month(), on.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Draws demographics and links patients to appointments
#[derive(Debug, Clone)]
pub struct PatientGenerator<'a> {
    config: &'a ValidatedConfig,
    bands: WeightedIndex<f64>,
}

impl<'a> PatientGenerator<'a> {
    /// Build the band sampler from the table's weights inside the cutoffs
    pub fn new(config: &'a ValidatedConfig) -> SchedulerResult<Self> {
        let weights = config
            .age_table
            .eligible_weights(config.lower_cutoff, config.upper_limit());
        let bands = WeightedIndex::new(&weights).map_err(|e| {
            SchedulerError::value_error(format!("No age band lies inside the cutoffs: {e}"))
        })?;
        Ok(Self { config, bands })
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Demographics {
        let band = &self.config.age_table.bands()[self.bands.sample(rng)];
        let (low, high) = band
            .clip(self.config.lower_cutoff, self.config.upper_limit())
            .unwrap_or((band.start, band.end));
        let age = rng.gen_range(low..=high);
        let sex = if rng.gen_bool(band.female_share()) {
            Sex::Female
        } else {
            Sex::Male
        };
        let dob = birth_date(self.config.ref_day(), age, rng);
        Demographics {
            sex,
            dob,
            age,
            age_group: age_group_label(
                age,
                self.config.bin_size,
                self.config.lower_cutoff,
                self.config.upper_cutoff,
            ),
        }
    }

    /// Generate a standalone table of `total` patients
    #[instrument(skip(self, rng))]
    pub fn generate<R: Rng + ?Sized>(&self, total: usize, rng: &mut R) -> SchedulerResult<Vec<Patient>> {
        if total == 0 {
            return Err(SchedulerError::value_error("Total number of patients must be greater than 0"));
        }
        let width = pad_width(total);
        let patients = (1..=total)
            .map(|seq| self.draw(rng).into_patient(PatientId::from_sequence(seq, width)))
            .collect();
        debug!(total, "Generated patients");
        Ok(patients)
    }

    /// Assign a patient to every appointment and return the patient table.
    ///
    /// Back-fills `patient_id`, `sex`, `age`, `age_group` and `is_first_attendance`
    /// onto the rows. A `rebooked_from` reference to an unknown appointment is a value
    /// error, raised before any row is modified.
    #[instrument(skip(self, appointments, rng), fields(appointments = appointments.len()))]
    pub fn link<R: Rng + ?Sized>(
        &self,
        appointments: &mut [Appointment],
        rng: &mut R,
    ) -> SchedulerResult<Vec<Patient>> {
        let position: BTreeMap<&AppointmentId, usize> = appointments
            .iter()
            .enumerate()
            .map(|(i, a)| (&a.appointment_id, i))
            .collect();
        let mut origin_of = vec![None; appointments.len()];
        for (i, appointment) in appointments.iter().enumerate() {
            if let Some(origin) = &appointment.rebooked_from {
                let index = position.get(origin).ok_or_else(|| {
                    SchedulerError::value_error(format!(
                        "Appointment {} was rebooked from unknown appointment {origin}",
                        appointment.appointment_id
                    ))
                })?;
                origin_of[i] = Some(*index);
            }
        }

        let mut order: Vec<usize> = (0..appointments.len()).collect();
        order.sort_by_key(|&i| (appointments[i].datetime(), appointments[i].rebook_iteration));

        let cap = self.config.max_visits_per_patient();
        let mut people: Vec<Demographics> = Vec::new();
        let mut visits: Vec<u32> = Vec::new();
        let mut eligible: Vec<usize> = Vec::new();
        let mut assigned: Vec<Option<(usize, bool)>> = vec![None; appointments.len()];

        for i in order {
            if let Some(link) = origin_of[i].and_then(|origin| assigned[origin]) {
                assigned[i] = Some(link);
                continue;
            }
            let first = eligible.is_empty() || rng.gen_bool(self.config.first_attendance);
            let person = if first {
                people.push(self.draw(rng));
                visits.push(0);
                eligible.push(people.len() - 1);
                people.len() - 1
            } else {
                eligible[rng.gen_range(0..eligible.len())]
            };
            visits[person] += 1;
            if visits[person] >= cap {
                if let Some(pos) = eligible.iter().position(|&p| p == person) {
                    eligible.swap_remove(pos);
                }
            }
            assigned[i] = Some((person, first));
        }

        let width = pad_width(people.len());
        let patients: Vec<Patient> = people
            .into_iter()
            .enumerate()
            .map(|(i, d)| d.into_patient(PatientId::from_sequence(i + 1, width)))
            .collect();

        for (appointment, link) in appointments.iter_mut().zip(assigned) {
            if let Some((person, first)) = link {
                let patient = &patients[person];
                appointment.patient_id = Some(patient.patient_id.clone());
                appointment.sex = Some(patient.sex);
                appointment.age = Some(patient.age);
                appointment.age_group = Some(patient.age_group.clone());
                appointment.is_first_attendance = Some(first);
            }
        }

        info!(patients = patients.len(), visit_cap = cap, "Linked patients to appointments");
        Ok(patients)
    }
}

/// A birth date giving exactly `age` whole years at `reference`
fn birth_date<R: Rng + ?Sized>(reference: NaiveDate, age: u32, rng: &mut R) -> NaiveDate {
    let latest = reference
        .checked_sub_months(Months::new(12 * age))
        .unwrap_or(reference);
    let before_earliest = reference
        .checked_sub_months(Months::new(12 * (age + 1)))
        .unwrap_or(latest - Duration::days(365));
    let span = (latest - before_earliest).num_days();
    let back = if span > 1 { rng.gen_range(0..span) } else { 0 };
    latest - Duration::days(back)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SchedulerConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> ValidatedConfig {
        SchedulerConfig::default().validate().unwrap()
    }

    #[test]
    fn test_ages_respect_cutoffs() {
        let config = config();
        let generator = PatientGenerator::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let patients = generator.generate(2_000, &mut rng).unwrap();
        assert_eq!(patients.len(), 2_000);
        for p in &patients {
            assert!(p.age >= 15 && p.age <= 90, "age {}", p.age);
            assert_eq!(age_on(p.dob, config.ref_day()), p.age);
            assert_eq!(p.age_group, age_group_label(p.age, 5, 15, 90));
        }
        assert_eq!(patients[0].patient_id.as_str(), "0001");
    }

    #[test]
    fn test_zero_patients_is_an_error() {
        let config = config();
        let generator = PatientGenerator::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generator.generate(0, &mut rng).unwrap_err().is_value_error());
    }

    #[test]
    fn test_sex_split_follows_table() {
        let config = config();
        let generator = PatientGenerator::new(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        let patients = generator.generate(5_000, &mut rng).unwrap();
        let female = patients.iter().filter(|p| p.sex == Sex::Female).count() as f64 / 5_000.0;
        // bundled table is roughly 56% female above age 15
        assert!(female > 0.5 && female < 0.62, "female share {female}");
    }

    #[test]
    fn test_age_on_birthdays() {
        let dob = NaiveDate::from_ymd_opt(2000, 6, 15).unwrap();
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()), 23);
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()), 24);
    }
}

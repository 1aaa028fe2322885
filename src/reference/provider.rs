//! Reference-data providers and default resolution

use csv::StringRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::helpers::{
    age_gender_probs_from_counts, first_attendance_ratio_from_counts, month_weights_from_totals,
    status_rates_from_percentages, weekday_weights_from_shares, AgeBandCounts, StatusPercentages,
};
use crate::calendar::CalendarWeights;
use crate::patients::{AgeSexBand, AgeSexTable};
use crate::simulation::SchedulerResult;
use crate::types::constants::{
    DEFAULT_AGE_GENDER_PROBS, DEFAULT_FIRST_ATTENDANCE_RATIO, DEFAULT_MONTH_WEIGHTS,
    DEFAULT_STATUS_RATES, DEFAULT_WEEKDAY_WEIGHTS,
};
use crate::types::{SchedulerConfig, StatusRates};

/// Source of the default tables used to seed a configuration.
///
/// Implementations never fail: an unreadable or malformed source yields an empty
/// map, an empty table or `None`.
pub trait ReferenceDataProvider {
    /// Outcome shares keyed by status name
    fn status_rates(&self) -> BTreeMap<String, f64>;
    /// Month (1-12) multipliers with mean near 1
    fn month_weights(&self) -> BTreeMap<u32, f64>;
    /// Weekday (0 = Monday) multipliers with mean near 1
    fn weekday_weights(&self) -> BTreeMap<u32, f64>;
    /// Age-band by sex shares
    fn age_gender_probs(&self) -> Vec<AgeSexBand>;
    /// Share of attendances that are first visits
    fn first_attendance_ratio(&self) -> Option<f64>;
}

/// The tables compiled into the crate
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledReferenceData;

impl ReferenceDataProvider for BundledReferenceData {
    fn status_rates(&self) -> BTreeMap<String, f64> {
        DEFAULT_STATUS_RATES
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    fn month_weights(&self) -> BTreeMap<u32, f64> {
        DEFAULT_MONTH_WEIGHTS.iter().copied().collect()
    }

    fn weekday_weights(&self) -> BTreeMap<u32, f64> {
        DEFAULT_WEEKDAY_WEIGHTS.iter().copied().collect()
    }

    fn age_gender_probs(&self) -> Vec<AgeSexBand> {
        DEFAULT_AGE_GENDER_PROBS
            .iter()
            .map(|(label, f, m)| AgeSexBand::new(*label, *f, *m))
            .collect()
    }

    fn first_attendance_ratio(&self) -> Option<f64> {
        Some(DEFAULT_FIRST_ATTENDANCE_RATIO)
    }
}

/// Column header aliases, compared case-insensitively after trimming
const ATTENDED_HEADERS: [&str; 2] = ["attendances %", "attended %"];
const DNA_HEADERS: [&str; 3] = ["did not attends (dnas) %", "dnas %", "did not attend %"];
const PATIENT_CANCEL_HEADERS: [&str; 2] = ["patient cancellations %", "patient cancellation %"];
const HOSPITAL_CANCEL_HEADERS: [&str; 2] = ["hospital cancellations %", "hospital cancellation %"];
const UNKNOWN_HEADERS: [&str; 2] = ["unknown %", "unknown"];

const MONTH_CODE_HEADER: &str = "CALENDAR_MONTH_END_DATE";
const MONTH_TOTAL_HEADER: &str = "Outpatient_Total_Appointments";

/// Fiscal year April 2023 to March 2024
pub const DEFAULT_MONTH_WINDOW: ((i32, u32), (i32, u32)) = ((2023, 4), (2024, 3));

/// Reference tables read from CSV files in one directory.
///
/// | File | Columns |
/// |---|---|
/// | `status_rates.csv` | `Attendances %`, `Did not attends (DNAs) %`, `Patient cancellations %`, `Hospital cancellations %`, `Unknown %` (first row is used) |
/// | `month_totals.csv` | `CALENDAR_MONTH_END_DATE` (`MONYY`), `Outpatient_Total_Appointments` |
/// | `weekday_shares.csv` | `weekday` (0 = Monday), `share` |
/// | `age_gender.csv` | `age_yrs`, `total_female`, `total_male`, or raw counts `attended_female_maternity`, `attended_female_non_maternity`, `attended_male`, `dna_female`, `dna_male` |
/// | `first_attendance.csv` | `First Attendances`, `Attendances`, optional `Label` (the `Total Activity` row is used) |
#[derive(Debug, Clone)]
pub struct CsvReferenceData {
    dir: PathBuf,
    month_window: ((i32, u32), (i32, u32)),
}

impl CsvReferenceData {
    /// Read tables from `dir`
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            month_window: DEFAULT_MONTH_WINDOW,
        }
    }

    /// Use a different inclusive `(year, month)` window for the month totals
    pub fn with_month_window(mut self, start: (i32, u32), end: (i32, u32)) -> Self {
        self.month_window = (start, end);
        self
    }

    fn read(&self, file: &str) -> Option<(StringRecord, Vec<StringRecord>)> {
        let path = self.dir.join(file);
        let result: SchedulerResult<(StringRecord, Vec<StringRecord>)> = (|| {
            let mut reader = csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_path(&path)?;
            let headers = reader.headers()?.clone();
            let records = reader.records().collect::<Result<Vec<_>, _>>()?;
            Ok((headers, records))
        })();
        match result {
            Ok(table) => {
                debug!(path = %path.display(), rows = table.1.len(), "Read reference table");
                Some(table)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read reference table");
                None
            }
        }
    }
}

fn column(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.trim().to_ascii_lowercase();
        aliases.iter().any(|a| a.eq_ignore_ascii_case(&h))
    })
}

fn number(record: &StringRecord, index: usize) -> Option<f64> {
    record.get(index)?.trim().replace(',', "").parse().ok()
}

impl ReferenceDataProvider for CsvReferenceData {
    fn status_rates(&self) -> BTreeMap<String, f64> {
        let Some((headers, records)) = self.read("status_rates.csv") else {
            return BTreeMap::new();
        };
        let columns = [
            &ATTENDED_HEADERS[..],
            &DNA_HEADERS[..],
            &PATIENT_CANCEL_HEADERS[..],
            &HOSPITAL_CANCEL_HEADERS[..],
            &UNKNOWN_HEADERS[..],
        ]
        .map(|aliases| column(&headers, aliases));
        let [Some(a), Some(d), Some(p), Some(h), Some(u)] = columns else {
            warn!("status_rates.csv is missing a required column");
            return BTreeMap::new();
        };
        let Some(row) = records.first() else {
            return BTreeMap::new();
        };
        let values = [a, d, p, h, u].map(|i| number(row, i));
        let [Some(attended), Some(did_not_attend), Some(patient), Some(hospital), Some(unknown)] =
            values
        else {
            return BTreeMap::new();
        };
        status_rates_from_percentages(&StatusPercentages {
            attended,
            did_not_attend,
            patient_cancellations: patient,
            hospital_cancellations: hospital,
            unknown,
        })
    }

    fn month_weights(&self) -> BTreeMap<u32, f64> {
        let Some((headers, records)) = self.read("month_totals.csv") else {
            return BTreeMap::new();
        };
        let (Some(code), Some(total)) = (
            column(&headers, &[MONTH_CODE_HEADER]),
            column(&headers, &[MONTH_TOTAL_HEADER]),
        ) else {
            warn!("month_totals.csv is missing a required column");
            return BTreeMap::new();
        };
        let rows: Vec<(String, f64)> = records
            .iter()
            .filter_map(|r| Some((r.get(code)?.to_string(), number(r, total)?)))
            .collect();
        month_weights_from_totals(&rows, self.month_window)
    }

    fn weekday_weights(&self) -> BTreeMap<u32, f64> {
        let Some((headers, records)) = self.read("weekday_shares.csv") else {
            return BTreeMap::new();
        };
        let (Some(day), Some(share)) = (column(&headers, &["weekday"]), column(&headers, &["share"]))
        else {
            warn!("weekday_shares.csv is missing a required column");
            return BTreeMap::new();
        };
        let mut shares = [f64::NAN; 7];
        for record in &records {
            let Some(d) = record.get(day).and_then(|d| d.parse::<usize>().ok()) else {
                return BTreeMap::new();
            };
            match (shares.get_mut(d), number(record, share)) {
                (Some(slot), Some(value)) => *slot = value,
                _ => return BTreeMap::new(),
            }
        }
        weekday_weights_from_shares(&shares)
    }

    fn age_gender_probs(&self) -> Vec<AgeSexBand> {
        let Some((headers, records)) = self.read("age_gender.csv") else {
            return Vec::new();
        };
        let Some(label) = column(&headers, &["age_yrs"]) else {
            warn!("age_gender.csv is missing column 'age_yrs'");
            return Vec::new();
        };

        if let (Some(f), Some(m)) = (
            column(&headers, &["total_female"]),
            column(&headers, &["total_male"]),
        ) {
            return records
                .iter()
                .map(|r| Some(AgeSexBand::new(r.get(label)?, number(r, f)?, number(r, m)?)))
                .collect::<Option<Vec<_>>>()
                .unwrap_or_default();
        }

        let raw = [
            "attended_female_maternity",
            "attended_female_non_maternity",
            "attended_male",
            "dna_female",
            "dna_male",
        ]
        .map(|name| column(&headers, &[name]));
        let [Some(afm), Some(afn), Some(am), Some(df), Some(dm)] = raw else {
            warn!("age_gender.csv is missing a required column");
            return Vec::new();
        };
        let counts = records
            .iter()
            .map(|r| {
                Some(AgeBandCounts {
                    age_yrs: r.get(label)?.to_string(),
                    attended_female_maternity: number(r, afm)?,
                    attended_female_non_maternity: number(r, afn)?,
                    attended_male: number(r, am)?,
                    dna_female: number(r, df)?,
                    dna_male: number(r, dm)?,
                })
            })
            .collect::<Option<Vec<_>>>()
            .unwrap_or_default();
        age_gender_probs_from_counts(&counts)
    }

    fn first_attendance_ratio(&self) -> Option<f64> {
        let (headers, records) = self.read("first_attendance.csv")?;
        let first = column(&headers, &["first attendances"])?;
        let total = column(&headers, &["attendances"])?;
        let row = match column(&headers, &["label"]) {
            Some(label) => records
                .iter()
                .find(|r| r.get(label).is_some_and(|l| l.eq_ignore_ascii_case("total activity")))?,
            None => records.first()?,
        };
        first_attendance_ratio_from_counts(number(row, first)?, number(row, total)?)
    }
}

/// Default tables resolved from a provider, table by table.
///
/// Any table the provider cannot supply, or supplies in a form that fails
/// validation, is replaced by the bundled constant.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDefaults {
    /// Outcome shares
    pub status_rates: BTreeMap<String, f64>,
    /// Month multipliers
    pub month_weights: BTreeMap<u32, f64>,
    /// Weekday multipliers
    pub weekday_weights: BTreeMap<u32, f64>,
    /// Age-band by sex shares
    pub age_gender_probs: Vec<AgeSexBand>,
    /// First-attendance ratio
    pub first_attendance: f64,
    /// Names of the tables that fell back to bundled data
    pub fallbacks: Vec<&'static str>,
}

impl ReferenceDefaults {
    /// Query every table from `provider`, falling back per table
    pub fn resolve(provider: &dyn ReferenceDataProvider) -> Self {
        let bundled = BundledReferenceData;
        let mut fallbacks = Vec::new();

        let status_rates = pick(
            "status_rates",
            provider.status_rates(),
            |m| !m.is_empty() && StatusRates::from_map(m).is_ok(),
            || bundled.status_rates(),
            &mut fallbacks,
        );
        let month_weights = pick(
            "month_weights",
            provider.month_weights(),
            |m| CalendarWeights::from_overrides(Some(m), None).is_ok(),
            || bundled.month_weights(),
            &mut fallbacks,
        );
        let weekday_weights = pick(
            "weekday_weights",
            provider.weekday_weights(),
            |m| CalendarWeights::from_overrides(None, Some(m)).is_ok(),
            || bundled.weekday_weights(),
            &mut fallbacks,
        );
        let age_gender_probs = pick(
            "age_gender_probs",
            provider.age_gender_probs(),
            |rows| AgeSexTable::from_bands(rows).is_ok(),
            || bundled.age_gender_probs(),
            &mut fallbacks,
        );
        let first_attendance = pick(
            "first_attendance",
            provider.first_attendance_ratio(),
            |r| r.is_some_and(|r| (0.0..=1.0).contains(&r)),
            || Some(DEFAULT_FIRST_ATTENDANCE_RATIO),
            &mut fallbacks,
        )
        .unwrap_or(DEFAULT_FIRST_ATTENDANCE_RATIO);

        info!(fallbacks = fallbacks.len(), "Resolved reference defaults");
        Self {
            status_rates,
            month_weights,
            weekday_weights,
            age_gender_probs,
            first_attendance,
            fallbacks,
        }
    }

    /// Copy the resolved tables into a configuration
    pub fn apply_to(&self, config: &mut SchedulerConfig) {
        config.status_rates = self.status_rates.clone();
        config.month_weights = Some(self.month_weights.clone());
        config.weekday_weights = Some(self.weekday_weights.clone());
        config.age_gender_probs = Some(self.age_gender_probs.clone());
        config.first_attendance = self.first_attendance;
    }
}

fn pick<T>(
    name: &'static str,
    supplied: T,
    usable: impl FnOnce(&T) -> bool,
    bundled: impl FnOnce() -> T,
    fallbacks: &mut Vec<&'static str>,
) -> T {
    if usable(&supplied) {
        return supplied;
    }
    warn!(table = name, "Reference data unavailable, using bundled defaults");
    fallbacks.push(name);
    bundled()
}

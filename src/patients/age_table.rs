//! Age-band by sex reference table and age-group binning

use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::simulation::{SchedulerError, SchedulerResult};
use crate::types::constants::{DEFAULT_AGE_GENDER_PROBS, MAX_AGE};

/// One row of the reference table as supplied by the caller or a CSV file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeSexBand {
    /// Band label, `"A-B"` or `"A+"`
    pub age_yrs: String,
    /// Female share (or count) in the band
    pub total_female: f64,
    /// Male share (or count) in the band
    pub total_male: f64,
}

impl AgeSexBand {
    /// Convenience constructor
    pub fn new(age_yrs: impl Into<String>, total_female: f64, total_male: f64) -> Self {
        Self {
            age_yrs: age_yrs.into(),
            total_female,
            total_male,
        }
    }
}

/// Parsed band with inclusive age bounds
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBand {
    /// Original label
    pub label: String,
    /// First age in the band
    pub start: u32,
    /// Last age in the band (inclusive)
    pub end: u32,
    /// Female weight
    pub female: f64,
    /// Male weight
    pub male: f64,
}

impl ParsedBand {
    /// Combined weight of both sexes
    pub fn total(&self) -> f64 {
        self.female + self.male
    }

    /// Probability that a patient drawn from this band is female
    pub fn female_share(&self) -> f64 {
        let total = self.total();
        if total > 0.0 {
            self.female / total
        } else {
            0.5
        }
    }

    /// Inclusive overlap of the band with `[lower, upper]`, if any
    pub fn clip(&self, lower: u32, upper: Option<u32>) -> Option<(u32, u32)> {
        let start = self.start.max(lower);
        let end = upper.map_or(self.end, |u| self.end.min(u));
        (start <= end).then_some((start, end))
    }
}

/// Parse a band label such as `"15-19"` or `"90+"` into inclusive bounds.
///
/// Open-ended bands stop at [`MAX_AGE`].
pub fn parse_band_label(label: &str) -> SchedulerResult<(u32, u32)> {
    let text = label.trim();
    let bad = || SchedulerError::value_error(format!("Invalid age band label: '{label}'"));

    if let Some(start) = text.strip_suffix('+') {
        let start: u32 = start.trim().parse().map_err(|_| bad())?;
        return Ok((start, MAX_AGE.max(start)));
    }
    let (start, end) = text.split_once('-').ok_or_else(bad)?;
    let start: u32 = start.trim().parse().map_err(|_| bad())?;
    let end: u32 = end.trim().parse().map_err(|_| bad())?;
    if start > end {
        return Err(bad());
    }
    Ok((start, end))
}

/// Validated age-band by sex table
#[derive(Debug, Clone, PartialEq)]
pub struct AgeSexTable {
    bands: Vec<ParsedBand>,
}

impl Default for AgeSexTable {
    fn default() -> Self {
        let bands = DEFAULT_AGE_GENDER_PROBS
            .iter()
            .map(|(label, f, m)| AgeSexBand::new(*label, *f, *m))
            .collect::<Vec<_>>();
        // The bundled rows are static and well-formed.
        Self::from_bands(&bands).unwrap_or(Self { bands: Vec::new() })
    }
}

impl AgeSexTable {
    /// Validate caller rows: parsable labels, finite non-negative weights, positive total
    pub fn from_bands(rows: &[AgeSexBand]) -> SchedulerResult<Self> {
        if rows.is_empty() {
            return Err(SchedulerError::value_error("age_gender_probs must not be empty"));
        }
        let mut bands = Vec::with_capacity(rows.len());
        for row in rows {
            let (start, end) = parse_band_label(&row.age_yrs)?;
            for (column, value) in [("total_female", row.total_female), ("total_male", row.total_male)] {
                if !value.is_finite() || value < 0.0 {
                    return Err(SchedulerError::value_error(format!(
                        "age_gender_probs[{}].{column} must be a non-negative number, got {value}",
                        row.age_yrs
                    )));
                }
            }
            bands.push(ParsedBand {
                label: row.age_yrs.trim().to_string(),
                start,
                end,
                female: row.total_female,
                male: row.total_male,
            });
        }
        if bands.iter().map(ParsedBand::total).sum::<f64>() <= 0.0 {
            return Err(SchedulerError::value_error("age_gender_probs has zero total weight"));
        }
        bands.sort_by_key(|b| b.start);
        Ok(Self { bands })
    }

    /// Read a table from CSV with headers `age_yrs,total_female,total_male`.
    ///
    /// Extra columns are ignored; a missing column is a value error.
    pub fn from_csv_reader<R: Read>(reader: R) -> SchedulerResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        for required in ["age_yrs", "total_female", "total_male"] {
            if !headers.iter().any(|h| h == required) {
                return Err(SchedulerError::value_error(format!(
                    "age/sex table is missing required column '{required}'"
                )));
            }
        }
        let mut rows = Vec::new();
        for record in csv_reader.deserialize::<AgeSexBand>() {
            rows.push(record?);
        }
        Self::from_bands(&rows)
    }

    /// The parsed bands in ascending age order
    pub fn bands(&self) -> &[ParsedBand] {
        &self.bands
    }

    /// Rows in caller form
    pub fn to_rows(&self) -> Vec<AgeSexBand> {
        self.bands
            .iter()
            .map(|b| AgeSexBand::new(b.label.clone(), b.female, b.male))
            .collect()
    }

    /// Sampling weight of each band after applying the cutoffs.
    ///
    /// A band only partly inside `[lower, upper]` keeps the covered fraction of its weight.
    pub fn eligible_weights(&self, lower: u32, upper: Option<u32>) -> Vec<f64> {
        self.bands
            .iter()
            .map(|band| match band.clip(lower, upper) {
                Some((start, end)) => {
                    let covered = f64::from(end - start + 1);
                    let width = f64::from(band.end - band.start + 1);
                    band.total() * covered / width
                }
                None => 0.0,
            })
            .collect()
    }
}

/// Label of the `bin_size`-wide group containing `age`.
///
/// Groups start at `lower_cutoff`; every age at or above `upper_cutoff` falls in the
/// open-ended group `"{upper_cutoff}+"`.
pub fn age_group_label(age: u32, bin_size: u32, lower_cutoff: u32, upper_cutoff: u32) -> String {
    if age >= upper_cutoff {
        return format!("{upper_cutoff}+");
    }
    let bin = bin_size.max(1);
    let offset = age.saturating_sub(lower_cutoff);
    let start = lower_cutoff + (offset / bin) * bin;
    let end = (start + bin - 1).min(upper_cutoff.saturating_sub(1));
    format!("{start}-{end}")
}

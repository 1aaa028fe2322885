//! Pure conversions from published activity figures to scheduler tables
//!
//! Every helper returns an empty map (or `None`) when its input cannot produce a
//! usable table, so callers can fall back to the bundled defaults.

use std::collections::BTreeMap;

use crate::patients::AgeSexBand;
use crate::types::constants::STATUS_KEYS;

const MONTH_CODES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Parse a `MONYY` month code such as `"APR24"` into `(2024, 4)`.
///
/// Surrounding whitespace and letter case are ignored. Anything else is `None`.
pub fn parse_month_code(code: &str) -> Option<(i32, u32)> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() != 5 || !code.is_ascii() {
        return None;
    }
    let (month, year) = code.split_at(3);
    let month = MONTH_CODES.iter().position(|m| *m == month)? as u32 + 1;
    if !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    Some((2000 + year, month))
}

/// Month-of-year weights with mean 1 from monthly appointment totals.
///
/// Only rows whose month code falls inside `window` (inclusive `(year, month)` pairs)
/// are used; repeated months are averaged. All twelve months must be covered.
pub fn month_weights_from_totals<S: AsRef<str>>(
    rows: &[(S, f64)],
    window: ((i32, u32), (i32, u32)),
) -> BTreeMap<u32, f64> {
    let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for (code, total) in rows {
        let Some(key) = parse_month_code(code.as_ref()) else {
            continue;
        };
        if key < window.0 || key > window.1 || !total.is_finite() || *total < 0.0 {
            continue;
        }
        let entry = sums.entry(key.1).or_insert((0.0, 0));
        entry.0 += total;
        entry.1 += 1;
    }
    if sums.len() != 12 {
        return BTreeMap::new();
    }
    let averages: BTreeMap<u32, f64> = sums
        .into_iter()
        .map(|(month, (sum, n))| (month, sum / n as f64))
        .collect();
    scale_to_unit_mean(averages)
}

/// Weekday weights with mean 1 from seven relative shares, Monday first
pub fn weekday_weights_from_shares(shares: &[f64]) -> BTreeMap<u32, f64> {
    if shares.len() != 7 || shares.iter().any(|s| !s.is_finite() || *s <= 0.0) {
        return BTreeMap::new();
    }
    scale_to_unit_mean((0u32..).zip(shares.iter().copied()).collect())
}

fn scale_to_unit_mean(values: BTreeMap<u32, f64>) -> BTreeMap<u32, f64> {
    let mean = values.values().sum::<f64>() / values.len() as f64;
    if !(mean.is_finite() && mean > 0.0) {
        return BTreeMap::new();
    }
    values.into_iter().map(|(k, v)| (k, v / mean)).collect()
}

/// Published outcome percentages for one year
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusPercentages {
    /// Attendances %
    pub attended: f64,
    /// Did-not-attend %
    pub did_not_attend: f64,
    /// Cancellations initiated by the patient %
    pub patient_cancellations: f64,
    /// Cancellations initiated by the hospital %
    pub hospital_cancellations: f64,
    /// Unknown outcome %
    pub unknown: f64,
}

/// Status rates summing to one, with both cancellation kinds merged into `cancelled`
pub fn status_rates_from_percentages(p: &StatusPercentages) -> BTreeMap<String, f64> {
    let values = [
        p.attended,
        p.patient_cancellations + p.hospital_cancellations,
        p.did_not_attend,
        p.unknown,
    ];
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return BTreeMap::new();
    }
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return BTreeMap::new();
    }
    STATUS_KEYS
        .iter()
        .zip(values)
        .map(|(key, v)| (key.to_string(), v / total))
        .collect()
}

/// Share of attendances that were first attendances
pub fn first_attendance_ratio_from_counts(first: f64, total: f64) -> Option<f64> {
    if !first.is_finite() || !total.is_finite() || total <= 0.0 || first < 0.0 || first > total {
        return None;
    }
    Some(first / total)
}

/// Raw attendance counts for one age band
#[derive(Debug, Clone, PartialEq)]
pub struct AgeBandCounts {
    /// Band label
    pub age_yrs: String,
    /// Attended, female, maternity
    pub attended_female_maternity: f64,
    /// Attended, female, non-maternity
    pub attended_female_non_maternity: f64,
    /// Attended, male
    pub attended_male: f64,
    /// Did not attend, female
    pub dna_female: f64,
    /// Did not attend, male
    pub dna_male: f64,
}

/// Age-band by sex probabilities (summing to one) from raw counts
pub fn age_gender_probs_from_counts(rows: &[AgeBandCounts]) -> Vec<AgeSexBand> {
    let totals: Vec<(&str, f64, f64)> = rows
        .iter()
        .map(|r| {
            (
                r.age_yrs.as_str(),
                r.attended_female_maternity + r.attended_female_non_maternity + r.dna_female,
                r.attended_male + r.dna_male,
            )
        })
        .collect();
    if totals
        .iter()
        .any(|(_, f, m)| !f.is_finite() || !m.is_finite() || *f < 0.0 || *m < 0.0)
    {
        return Vec::new();
    }
    let grand: f64 = totals.iter().map(|(_, f, m)| f + m).sum();
    if grand <= 0.0 {
        return Vec::new();
    }
    totals
        .into_iter()
        .map(|(label, f, m)| AgeSexBand::new(label, f / grand, m / grand))
        .collect()
}

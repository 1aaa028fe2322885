//! Bundled reference defaults and validation limits
//!
//! The reference tables here stand in for published outpatient activity statistics:
//! status shares, seasonal month and weekday multipliers, and an age-band by sex
//! population table. They are used whenever the caller (or a reference-data
//! provider) does not supply its own.

use tracing::warn;

use crate::simulation::{SchedulerError, SchedulerResult};

/// Canonical order of the outcome-status keys
pub const STATUS_KEYS: [&str; 4] = ["attended", "cancelled", "did not attend", "unknown"];

/// Default outcome shares, in [`STATUS_KEYS`] order
pub const DEFAULT_STATUS_RATES: [(&str, f64); 4] = [
    ("attended", 0.773),
    ("cancelled", 0.164),
    ("did not attend", 0.059),
    ("unknown", 0.004),
];

/// Month-of-year (1-12) seasonal multipliers, derived from monthly appointment totals
pub const DEFAULT_MONTH_WEIGHTS: [(u32, f64); 12] = [
    (1, 0.98),
    (2, 0.95),
    (3, 1.06),
    (4, 0.93),
    (5, 0.99),
    (6, 1.02),
    (7, 1.03),
    (8, 0.96),
    (9, 1.01),
    (10, 1.05),
    (11, 1.06),
    (12, 0.93),
];

/// Weekday (0 = Monday .. 6 = Sunday) multipliers
pub const DEFAULT_WEEKDAY_WEIGHTS: [(u32, f64); 7] = [
    (0, 1.30),
    (1, 1.33),
    (2, 1.31),
    (3, 1.29),
    (4, 1.17),
    (5, 0.35),
    (6, 0.25),
];

/// Outpatient attendance shares by age band: `(age_yrs, total_female, total_male)`
pub const DEFAULT_AGE_GENDER_PROBS: [(&str, f64, f64); 19] = [
    ("0-4", 0.021, 0.025),
    ("5-9", 0.014, 0.016),
    ("10-14", 0.014, 0.014),
    ("15-19", 0.016, 0.013),
    ("20-24", 0.021, 0.013),
    ("25-29", 0.028, 0.015),
    ("30-34", 0.033, 0.018),
    ("35-39", 0.032, 0.019),
    ("40-44", 0.029, 0.020),
    ("45-49", 0.029, 0.022),
    ("50-54", 0.032, 0.027),
    ("55-59", 0.034, 0.031),
    ("60-64", 0.034, 0.033),
    ("65-69", 0.035, 0.034),
    ("70-74", 0.038, 0.037),
    ("75-79", 0.033, 0.031),
    ("80-84", 0.024, 0.021),
    ("85-89", 0.014, 0.011),
    ("90+", 0.008, 0.005),
];

/// Share of attendances that are a patient's first visit
pub const DEFAULT_FIRST_ATTENDANCE_RATIO: f64 = 0.325;

/// Allowed values of `appointments_per_hour` (divisors of 60)
pub const ALLOWED_APPOINTMENTS_PER_HOUR: [u32; 5] = [1, 2, 3, 4, 6];

/// Lowest accepted fill rate (inclusive)
pub const MIN_FILL_RATE: f64 = 0.30;

/// Upper bound on `visits_per_year`
pub const MAX_VISITS_PER_YEAR: f64 = 12.0;

/// Upper bound on the age-group width
pub const MAX_BIN_SIZE: u32 = 20;

/// Longest accepted booking horizon in days.
///
/// Bounds the lead-time support and keeps horizon dates inside chrono's date range.
pub const MAX_BOOKING_HORIZON: u32 = 3650;

/// Accepted range for the mean check-in offset, in minutes relative to the slot
pub const CHECK_IN_MEAN_RANGE: (f64, f64) = (-60.0, 60.0);

/// Standard deviation of the check-in offset at zero noise, in minutes
pub const CHECK_IN_BASE_SD_MINUTES: f64 = 10.0;

/// Tolerance on `sum(status_rates) == 1`
pub const STATUS_RATE_TOLERANCE: f64 = 1e-3;

/// Oldest age produced for an open-ended band such as "90+"
pub const MAX_AGE: u32 = 100;

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Sanity-check the bundled defaults.
///
/// Structural problems (wrong keys, negative or non-finite values, rates not summing
/// to one) always fail. Weight-table means are only required to sit near 1.0; with
/// `strict` they must equal 1.0 exactly (to 1e-9), which the rounded month table does not.
pub fn validate_defaults(strict: bool) -> SchedulerResult<()> {
    let keys: Vec<&str> = DEFAULT_STATUS_RATES.iter().map(|(k, _)| *k).collect();
    if keys != STATUS_KEYS {
        return Err(SchedulerError::value_error("default status rates do not match status keys"));
    }
    let sum: f64 = DEFAULT_STATUS_RATES.iter().map(|(_, v)| v).sum();
    if (sum - 1.0).abs() > STATUS_RATE_TOLERANCE {
        return Err(SchedulerError::value_error(format!(
            "default status rates sum to {sum}, expected 1.0"
        )));
    }

    let mut all_weights = DEFAULT_MONTH_WEIGHTS
        .iter()
        .chain(DEFAULT_WEEKDAY_WEIGHTS.iter())
        .map(|(_, w)| *w);
    if all_weights.any(|w| !w.is_finite() || w <= 0.0) {
        return Err(SchedulerError::value_error("default calendar weights must be positive"));
    }
    if DEFAULT_AGE_GENDER_PROBS
        .iter()
        .any(|(_, f, m)| !f.is_finite() || !m.is_finite() || *f < 0.0 || *m < 0.0)
    {
        return Err(SchedulerError::value_error("default age/sex shares must be non-negative"));
    }

    let tables = [
        ("month", mean(DEFAULT_MONTH_WEIGHTS.iter().map(|(_, w)| *w))),
        ("weekday", mean(DEFAULT_WEEKDAY_WEIGHTS.iter().map(|(_, w)| *w))),
    ];
    for (name, m) in tables {
        let deviation = (m - 1.0).abs();
        if strict && deviation > 1e-9 {
            return Err(SchedulerError::value_error(format!(
                "default {name} weights have mean {m:.6}, expected exactly 1.0"
            )));
        }
        if deviation > 0.05 {
            return Err(SchedulerError::value_error(format!(
                "default {name} weights have mean {m:.4}, too far from 1.0"
            )));
        }
        if deviation > 1e-9 {
            warn!(table = name, mean = m, "Default weight table mean is not exactly 1.0");
        }
    }

    if !(0.0..=1.0).contains(&DEFAULT_FIRST_ATTENDANCE_RATIO) {
        return Err(SchedulerError::value_error("default first-attendance ratio outside [0, 1]"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_mean_near_one() {
        let m = mean(DEFAULT_MONTH_WEIGHTS.iter().map(|(_, w)| *w));
        let w = mean(DEFAULT_WEEKDAY_WEIGHTS.iter().map(|(_, w)| *w));
        assert!(m > 0.95 && m < 1.05);
        assert!(w > 0.95 && w < 1.05);
        let days: Vec<u32> = DEFAULT_WEEKDAY_WEIGHTS.iter().map(|(d, _)| *d).collect();
        assert_eq!(days, (0..7).collect::<Vec<_>>());
        assert!(DEFAULT_MONTH_WEIGHTS.iter().all(|(m, _)| (1..=12).contains(m)));
    }

    #[test]
    fn test_status_defaults_follow_key_order() {
        let keys: Vec<&str> = DEFAULT_STATUS_RATES.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, STATUS_KEYS);
        assert!(DEFAULT_STATUS_RATES.iter().all(|(_, v)| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_validate_defaults_non_strict_and_strict() {
        assert!(validate_defaults(false).is_ok());
        let err = validate_defaults(true).unwrap_err();
        assert!(err.is_value_error());
    }

    #[test]
    fn test_limits_are_sane() {
        assert!(MAX_VISITS_PER_YEAR > 0.0);
        assert!(MAX_BIN_SIZE >= 1);
        assert!(MAX_BOOKING_HORIZON >= 365);
        assert!(ALLOWED_APPOINTMENTS_PER_HOUR.iter().all(|n| 60 % n == 0));
    }
}

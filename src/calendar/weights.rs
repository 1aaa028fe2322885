//! Calendar weighting
//!
//! A date's raw desirability is `month_weight[month] * weekday_weight[weekday]`.
//! Raw weights are never renormalized, so two dates can be compared directly; only
//! when sampling from a finite candidate set are they turned into probabilities.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::simulation::{SchedulerError, SchedulerResult};
use crate::types::constants::{DEFAULT_MONTH_WEIGHTS, DEFAULT_WEEKDAY_WEIGHTS};

/// Month-of-year and weekday multipliers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarWeights {
    /// Index 0 = January
    month: [f64; 12],
    /// Index 0 = Monday
    weekday: [f64; 7],
}

impl Default for CalendarWeights {
    fn default() -> Self {
        let mut month = [1.0; 12];
        for (m, w) in DEFAULT_MONTH_WEIGHTS {
            month[(m - 1) as usize] = w;
        }
        let mut weekday = [1.0; 7];
        for (d, w) in DEFAULT_WEEKDAY_WEIGHTS {
            weekday[d as usize] = w;
        }
        Self { month, weekday }
    }
}

impl CalendarWeights {
    /// Build weights from optional caller overrides, falling back to the bundled tables.
    ///
    /// An override must cover its whole key range (months 1-12, weekdays 0-6) with
    /// positive finite values.
    pub fn from_overrides(
        month: Option<&BTreeMap<u32, f64>>,
        weekday: Option<&BTreeMap<u32, f64>>,
    ) -> SchedulerResult<Self> {
        let mut weights = Self::default();
        if let Some(map) = month {
            weights.month = fill_table::<12>("month_weights", map, 1)?;
        }
        if let Some(map) = weekday {
            weights.weekday = fill_table::<7>("weekday_weights", map, 0)?;
        }
        Ok(weights)
    }

    /// Multiplier for a month (1-12)
    pub fn month_weight(&self, month: u32) -> f64 {
        self.month[(month.clamp(1, 12) - 1) as usize]
    }

    /// Multiplier for a weekday (0 = Monday)
    pub fn weekday_weight(&self, weekday: u32) -> f64 {
        self.weekday[weekday.min(6) as usize]
    }

    /// Raw, unnormalized weight of a date
    pub fn raw_weight(&self, date: NaiveDate) -> f64 {
        self.month_weight(date.month()) * self.weekday_weight(date.weekday().num_days_from_monday())
    }

    /// Month table as a map keyed 1-12
    pub fn month_map(&self) -> BTreeMap<u32, f64> {
        (1..=12).zip(self.month).collect()
    }

    /// Weekday table as a map keyed 0-6
    pub fn weekday_map(&self) -> BTreeMap<u32, f64> {
        (0..7).zip(self.weekday).collect()
    }
}

fn fill_table<const N: usize>(
    name: &str,
    map: &BTreeMap<u32, f64>,
    first_key: u32,
) -> SchedulerResult<[f64; N]> {
    let last_key = first_key + N as u32 - 1;
    if let Some(bad) = map.keys().find(|k| **k < first_key || **k > last_key) {
        return Err(SchedulerError::value_error(format!(
            "{name} has key {bad} outside {first_key}..={last_key}"
        )));
    }
    let mut table = [0.0; N];
    for (i, slot) in table.iter_mut().enumerate() {
        let key = first_key + i as u32;
        let value = *map.get(&key).ok_or_else(|| {
            SchedulerError::value_error(format!("{name} is missing key {key}"))
        })?;
        if !value.is_finite() || value <= 0.0 {
            return Err(SchedulerError::value_error(format!(
                "{name}[{key}] must be a positive finite number, got {value}"
            )));
        }
        *slot = value;
    }
    Ok(table)
}

/// Turn non-negative weights into a probability vector.
///
/// Returns `None` if the weights are empty, contain a negative or non-finite entry,
/// or sum to zero.
pub fn normalize(weights: &[f64]) -> Option<Vec<f64>> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return None;
    }
    let total: f64 = weights.iter().sum();
    if weights.is_empty() || total <= 0.0 {
        return None;
    }
    Some(weights.iter().map(|w| w / total).collect())
}

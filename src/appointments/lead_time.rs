//! Lead-time model
//!
//! The lead time is the number of whole days between the day an appointment is booked
//! and the appointment itself. It follows a truncated geometric law on
//! `0..=max_interval`, `p(k) ∝ r^k`, with `r` fitted so that the distribution's median
//! is the configured target.
//!
//! Short medians give `r < 1` and a curve that decays with the lead time. A median
//! past the middle of the window needs `r > 1`, so probability then grows toward
//! the horizon; a median of exactly half the window is close to uniform.
//!
//! The fit solves `CDF(m - 1) + p(m) / 2 = 1/2` for `r` by bisection on `ln r`. At the
//! solution `CDF(m - 1) < 1/2 < CDF(m)`, so the smallest `k` with `CDF(k) >= 1/2`
//! is exactly `m`.

use chrono::{Duration, NaiveDate};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::Serialize;

use crate::types::constants::MAX_BOOKING_HORIZON;

const LOG_RATIO_BOUND: f64 = 20.0;
const BISECTION_STEPS: usize = 200;

/// Discrete lead-time distribution over `0..=max_interval` days
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadTimeDistribution {
    /// Day offsets `0..=max_interval`
    pub intervals: Vec<u32>,
    /// Raw (unnormalized) weights `r^k`, rising when `r > 1`
    pub weights: Vec<f64>,
    /// Normalized probabilities
    pub pmf: Vec<f64>,
}

impl LeadTimeDistribution {
    /// Fit the distribution to a target median.
    ///
    /// `max_interval == 0` gives empty vectors: there is no lookahead window.
    /// `max_interval` is capped at [`MAX_BOOKING_HORIZON`] and the median is clamped
    /// to the resulting window.
    pub fn fit(max_interval: u32, median: u32) -> Self {
        let max_interval = max_interval.min(MAX_BOOKING_HORIZON);
        if max_interval == 0 {
            return Self {
                intervals: Vec::new(),
                weights: Vec::new(),
                pmf: Vec::new(),
            };
        }
        let median = median.min(max_interval);
        let (mut lo, mut hi) = (-LOG_RATIO_BOUND, LOG_RATIO_BOUND);
        for _ in 0..BISECTION_STEPS {
            let mid = 0.5 * (lo + hi);
            if median_gap(max_interval, median, mid) > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let log_ratio = 0.5 * (lo + hi);
        let weights = ratio_weights(max_interval, log_ratio);
        let total: f64 = weights.iter().sum();
        let pmf = weights.iter().map(|w| w / total).collect();

        Self {
            intervals: (0..=max_interval).collect(),
            weights,
            pmf,
        }
    }

    /// Whether the distribution has no support
    pub fn is_empty(&self) -> bool {
        self.pmf.is_empty()
    }

    /// Largest interval in the support
    pub fn max_interval(&self) -> u32 {
        self.intervals.last().copied().unwrap_or(0)
    }

    /// Smallest interval whose cumulative probability reaches one half
    pub fn median(&self) -> Option<u32> {
        let mut cumulative = 0.0;
        for (k, p) in self.intervals.iter().zip(&self.pmf) {
            cumulative += p;
            if cumulative >= 0.5 {
                return Some(*k);
            }
        }
        self.intervals.last().copied()
    }

    /// `P(lead >= days)`
    pub fn survival(&self, days: u32) -> f64 {
        self.pmf.iter().skip(days as usize).sum::<f64>().clamp(0.0, 1.0)
    }

    /// Draw a lead time; 0 when the distribution is empty
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        self.sample_at_least(0, rng).unwrap_or(0)
    }

    /// Draw a lead time conditioned on `lead >= min_days`.
    ///
    /// `None` when no support remains at or above `min_days`.
    pub fn sample_at_least<R: Rng + ?Sized>(&self, min_days: u32, rng: &mut R) -> Option<u32> {
        let start = min_days as usize;
        let tail = self.pmf.get(start..)?;
        let index = WeightedIndex::new(tail).ok()?;
        Some(self.intervals[start + index.sample(rng)])
    }
}

fn ratio_weights(max_interval: u32, log_ratio: f64) -> Vec<f64> {
    // Shift exponents by their maximum so large ratios do not overflow.
    let peak = if log_ratio > 0.0 {
        log_ratio * f64::from(max_interval)
    } else {
        0.0
    };
    (0..=max_interval)
        .map(|k| (log_ratio * f64::from(k) - peak).exp())
        .collect()
}

/// `CDF(m - 1) + p(m) / 2 - 1/2`, decreasing in `log_ratio`
fn median_gap(max_interval: u32, median: u32, log_ratio: f64) -> f64 {
    let weights = ratio_weights(max_interval, log_ratio);
    let total: f64 = weights.iter().sum();
    let below: f64 = weights[..median as usize].iter().sum();
    (below + 0.5 * weights[median as usize]) / total - 0.5
}

/// Booking date for an appointment `interval` days ahead, never before `earliest`.
///
/// Returns the (possibly clipped) scheduling date and the resulting interval.
pub fn scheduling_date_for(
    appointment_date: NaiveDate,
    interval: u32,
    earliest: NaiveDate,
) -> (NaiveDate, u32) {
    let raw = appointment_date - Duration::days(i64::from(interval));
    let scheduling_date = raw.max(earliest).min(appointment_date);
    let actual = (appointment_date - scheduling_date).num_days().max(0) as u32;
    (scheduling_date, actual)
}

//! Categorical columns attached to the patient table after generation

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::info;

use super::{Patient, PATIENT_COLUMNS};
use crate::calendar::normalize;
use crate::simulation::{SchedulerError, SchedulerResult};
use crate::types::DistributionType;

/// Category probabilities for a column.
///
/// Explicit `custom_probs` win over the distribution shape and are normalized.
/// `Normal` places a bell curve over the category positions, centred on the middle
/// with a standard deviation of a quarter of the category count.
pub fn category_probabilities(
    categories: usize,
    distribution: DistributionType,
    custom_probs: Option<&[f64]>,
) -> SchedulerResult<Vec<f64>> {
    if categories == 0 {
        return Err(SchedulerError::value_error("categories must not be empty"));
    }
    if let Some(probs) = custom_probs {
        if probs.len() != categories {
            return Err(SchedulerError::value_error(format!(
                "custom_probs has {} entries but there are {categories} categories",
                probs.len()
            )));
        }
        return normalize(probs).ok_or_else(|| {
            SchedulerError::value_error(
                "custom_probs must be finite, non-negative and have a positive sum",
            )
        });
    }
    let weights: Vec<f64> = match distribution {
        DistributionType::Uniform => vec![1.0; categories],
        DistributionType::Normal => {
            let centre = (categories as f64 - 1.0) / 2.0;
            let sigma = categories as f64 / 4.0;
            (0..categories)
                .map(|i| (-0.5 * ((i as f64 - centre) / sigma).powi(2)).exp())
                .collect()
        }
    };
    normalize(&weights)
        .ok_or_else(|| SchedulerError::value_error("category weights have a zero sum"))
}

/// Add a categorical column to every patient.
///
/// Fails, leaving the table untouched, if there are no patients, the name is empty or
/// already taken (built-in or custom), `categories` is empty, `distribution_type` is
/// not `uniform` or `normal`, or `custom_probs` is malformed.
pub fn add_custom_column<S, R>(
    patients: &mut [Patient],
    name: &str,
    categories: &[S],
    distribution_type: &str,
    custom_probs: Option<&[f64]>,
    rng: &mut R,
) -> SchedulerResult<()>
where
    S: AsRef<str>,
    R: Rng + ?Sized,
{
    if patients.is_empty() {
        return Err(SchedulerError::value_error(
            "Patient table is empty; generate patients before adding columns",
        ));
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(SchedulerError::value_error("Column name must not be empty"));
    }
    if PATIENT_COLUMNS.contains(&name) || patients[0].custom.contains_key(name) {
        return Err(SchedulerError::value_error(format!("Column '{name}' already exists")));
    }
    if categories.is_empty() {
        return Err(SchedulerError::value_error("categories must not be empty"));
    }
    let distribution: DistributionType = distribution_type.parse().map_err(SchedulerError::Value)?;
    let probabilities = category_probabilities(categories.len(), distribution, custom_probs)?;
    let index = WeightedIndex::new(&probabilities)
        .map_err(|e| SchedulerError::value_error(format!("Invalid category probabilities: {e}")))?;

    for patient in patients.iter_mut() {
        let value = categories[index.sample(rng)].as_ref().to_string();
        patient.custom.insert(name.to_string(), value);
    }
    info!(
        column = name,
        categories = categories.len(),
        distribution = %distribution,
        "Added custom patient column"
    );
    Ok(())
}

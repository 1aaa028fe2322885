//! Reference-data providers feeding configuration defaults

use chrono::Datelike;
use medscheduler::reference::{
    month_weights_from_totals, parse_month_code, weekday_weights_from_shares, DEFAULT_MONTH_WINDOW,
};
use medscheduler::{
    AgeSexBand, AppointmentScheduler, BundledReferenceData, CsvReferenceData, ReferenceDataProvider,
    ReferenceDefaults, SchedulerConfig,
};
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

const MONTHS: [&str; 12] = [
    "APR23", "MAY23", "JUN23", "JUL23", "AUG23", "SEP23", "OCT23", "NOV23", "DEC23", "JAN24", "FEB24",
    "MAR24",
];

/// Provider for a clinic that only sees people over fifty and runs Mondays heavy
struct OlderPatientsClinic;

impl ReferenceDataProvider for OlderPatientsClinic {
    fn status_rates(&self) -> BTreeMap<String, f64> {
        BundledReferenceData.status_rates()
    }

    fn month_weights(&self) -> BTreeMap<u32, f64> {
        BTreeMap::new()
    }

    fn weekday_weights(&self) -> BTreeMap<u32, f64> {
        weekday_weights_from_shares(&[10.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0])
    }

    fn age_gender_probs(&self) -> Vec<AgeSexBand> {
        vec![AgeSexBand::new("50-59", 0.3, 0.2), AgeSexBand::new("60-69", 0.3, 0.2)]
    }

    fn first_attendance_ratio(&self) -> Option<f64> {
        Some(1.5)
    }
}

#[test]
fn test_month_codes() {
    assert_eq!(parse_month_code("APR23"), Some((2023, 4)));
    assert_eq!(parse_month_code(" mar24 "), Some((2024, 3)));
    assert_eq!(parse_month_code("MARCH"), None);
    assert_eq!(parse_month_code("XYZ24"), None);
    assert_eq!(parse_month_code("2024-03"), None);
}

#[test]
fn test_month_weights_use_only_the_window() {
    let mut rows: Vec<(String, f64)> = MONTHS
        .iter()
        .enumerate()
        .map(|(i, code)| (code.to_string(), if i == 0 { 200.0 } else { 100.0 }))
        .collect();
    // Outside the window, ignored
    rows.push(("APR22".to_string(), 1_000_000.0));

    let weights = month_weights_from_totals(&rows, DEFAULT_MONTH_WINDOW);
    assert_eq!(weights.len(), 12);
    let mean = weights.values().sum::<f64>() / 12.0;
    assert!((mean - 1.0).abs() < 1e-9);
    assert!((weights[&4] / weights[&5] - 2.0).abs() < 1e-9);

    // Eleven months are not enough
    let weights = month_weights_from_totals(&rows[1..12], DEFAULT_MONTH_WINDOW);
    assert!(weights.is_empty());
}

#[test]
fn test_csv_directory_resolves_into_a_working_configuration() {
    let dir = TempDir::new().unwrap();
    let mut month_totals = String::from("CALENDAR_MONTH_END_DATE,Outpatient_Total_Appointments\n");
    for (i, code) in MONTHS.iter().enumerate() {
        month_totals.push_str(&format!("{code},\"{}\"\n", 9_000_000 + i * 100_000));
    }
    fs::write(dir.path().join("month_totals.csv"), month_totals).unwrap();
    fs::write(
        dir.path().join("age_gender.csv"),
        "age_yrs,total_female,total_male\n15-44,0.3,0.2\n45-74,0.2,0.2\n75+,0.05,0.05\n",
    )
    .unwrap();

    let provider = CsvReferenceData::new(dir.path());
    let defaults = ReferenceDefaults::resolve(&provider);
    assert!(!defaults.fallbacks.contains(&"month_weights"));
    assert!(!defaults.fallbacks.contains(&"age_gender_probs"));
    assert!(defaults.fallbacks.contains(&"status_rates"));
    assert!(defaults.fallbacks.contains(&"weekday_weights"));
    assert!(defaults.fallbacks.contains(&"first_attendance"));
    assert!(defaults.month_weights[&3] > defaults.month_weights[&4]);

    let mut config = SchedulerConfig {
        date_ranges: vec![("2024-01-01".into(), "2024-03-31".into())],
        ref_date: "2024-03-01".into(),
        seed: Some(77),
        ..Default::default()
    };
    defaults.apply_to(&mut config);
    assert_eq!(config.age_gender_probs.as_ref().map(Vec::len), Some(3));

    let mut scheduler = AppointmentScheduler::new(config).unwrap();
    scheduler.generate().unwrap();
    assert!(!scheduler.patients().is_empty());
}

#[test]
fn test_missing_directory_falls_back_to_bundled() {
    let provider = CsvReferenceData::new("/nonexistent/reference");
    let defaults = ReferenceDefaults::resolve(&provider);
    let bundled = ReferenceDefaults::resolve(&BundledReferenceData);

    assert_eq!(defaults.fallbacks.len(), 5);
    assert_eq!(defaults.status_rates, bundled.status_rates);
    assert_eq!(defaults.month_weights, bundled.month_weights);
    assert_eq!(defaults.age_gender_probs, bundled.age_gender_probs);
}

#[test]
fn test_custom_provider_shapes_generation() {
    let defaults = ReferenceDefaults::resolve(&OlderPatientsClinic);
    // Out-of-range ratio is replaced, the rest is kept
    assert_eq!(defaults.fallbacks, vec!["month_weights", "first_attendance"]);

    let mut config = SchedulerConfig {
        date_ranges: vec![("2024-01-01".into(), "2024-06-30".into())],
        ref_date: "2024-06-01".into(),
        fill_rate: 0.5,
        seed: Some(3),
        ..Default::default()
    };
    defaults.apply_to(&mut config);
    let mut scheduler = AppointmentScheduler::new(config).unwrap();
    scheduler.generate().unwrap();

    for patient in scheduler.patients() {
        assert!((50..=69).contains(&patient.age), "age {}", patient.age);
    }

    let past: Vec<_> = scheduler
        .appointments()
        .iter()
        .filter(|a| a.rebook_iteration == 0 && a.datetime() < scheduler.config().ref_date)
        .collect();
    let mondays = past
        .iter()
        .filter(|a| a.appointment_date.weekday().num_days_from_monday() == 0)
        .count();
    // A flat calendar would put about a fifth of bookings on Mondays
    assert!(mondays as f64 / past.len() as f64 > 0.3);
}

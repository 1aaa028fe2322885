//! Configuration structures for the scheduler
//!
//! [`SchedulerConfig`] is the raw, caller-facing parameter set. It accepts the loose
//! input forms people actually write (dates as text or chrono values, working hours as
//! integers, decimals or `"HH:MM"` strings) and is turned into a [`ValidatedConfig`]
//! by [`SchedulerConfig::validate`]. Generation stages only ever see the validated
//! form, which cannot be constructed any other way.
//!
//! Configuration can come from three places, highest priority first: command line
//! arguments ([`CliArgs`]), a JSON file, and [`SchedulerConfig::default`].

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::calendar::CalendarWeights;
use crate::patients::{AgeSexBand, AgeSexTable};
use crate::simulation::{SchedulerError, SchedulerResult};
use crate::types::constants::{
    ALLOWED_APPOINTMENTS_PER_HOUR, CHECK_IN_MEAN_RANGE, DEFAULT_FIRST_ATTENDANCE_RATIO,
    DEFAULT_STATUS_RATES, MAX_BIN_SIZE, MAX_BOOKING_HORIZON, MAX_VISITS_PER_YEAR, MIN_FILL_RATE,
    STATUS_KEYS, STATUS_RATE_TOLERANCE,
};
use crate::types::{AppointmentStatus, RebookCategory};

/// A date or date-time in any of the accepted input forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateSpec {
    /// Calendar date; resolves to midnight
    Date(NaiveDate),
    /// Full timestamp
    DateTime(NaiveDateTime),
    /// ISO text: `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]` or `YYYY-MM-DDTHH:MM[:SS]`
    Text(String),
}

impl DateSpec {
    /// Resolve to a timestamp
    pub fn resolve(&self) -> SchedulerResult<NaiveDateTime> {
        match self {
            DateSpec::Date(date) => at_hour_minute(*date, 0, 0),
            DateSpec::DateTime(dt) => Ok(*dt),
            DateSpec::Text(text) => parse_date_text(text),
        }
    }
}

impl From<NaiveDate> for DateSpec {
    fn from(date: NaiveDate) -> Self {
        DateSpec::Date(date)
    }
}

impl From<NaiveDateTime> for DateSpec {
    fn from(dt: NaiveDateTime) -> Self {
        DateSpec::DateTime(dt)
    }
}

impl From<&str> for DateSpec {
    fn from(text: &str) -> Self {
        DateSpec::Text(text.to_string())
    }
}

fn at_hour_minute(date: NaiveDate, hour: u32, minute: u32) -> SchedulerResult<NaiveDateTime> {
    date.and_hms_opt(hour, minute, 0)
        .ok_or_else(|| SchedulerError::value_error(format!("Invalid time {hour}:{minute:02} on {date}")))
}

fn parse_date_text(text: &str) -> SchedulerResult<NaiveDateTime> {
    let trimmed = text.trim();
    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }
    match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        Ok(date) => at_hour_minute(date, 0, 0),
        Err(_) => Err(SchedulerError::value_error(format!(
            "Invalid date '{text}' (expected YYYY-MM-DD or YYYY-MM-DD HH:MM[:SS])"
        ))),
    }
}

/// One endpoint of a working-hours interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HourSpec {
    /// Whole hour, e.g. `8`
    Hour(i64),
    /// Decimal hour with a zero fractional part, e.g. `8.0`
    Decimal(f64),
    /// `"H"`, `"HH"`, `"H:MM"` or `"HH:MM"` with minutes `00`
    Text(String),
}

impl HourSpec {
    /// Resolve to an hour of day in `0..=24`
    pub fn resolve(&self) -> SchedulerResult<u32> {
        match self {
            HourSpec::Hour(hour) => whole_hour(*hour),
            HourSpec::Decimal(value) => {
                if !value.is_finite() {
                    return Err(SchedulerError::value_error(format!("Invalid working hour: {value}")));
                }
                if value.fract() != 0.0 {
                    return Err(SchedulerError::value_error(format!(
                        "Working hours must start and end on the hour, got {value}"
                    )));
                }
                whole_hour(*value as i64)
            }
            HourSpec::Text(text) => parse_hour_text(text),
        }
    }
}

impl From<u32> for HourSpec {
    fn from(hour: u32) -> Self {
        HourSpec::Hour(i64::from(hour))
    }
}

impl From<f64> for HourSpec {
    fn from(hour: f64) -> Self {
        HourSpec::Decimal(hour)
    }
}

impl From<&str> for HourSpec {
    fn from(text: &str) -> Self {
        HourSpec::Text(text.to_string())
    }
}

fn whole_hour(hour: i64) -> SchedulerResult<u32> {
    if !(0..=24).contains(&hour) {
        return Err(SchedulerError::value_error(format!(
            "Working hour {hour} is outside 0..=24"
        )));
    }
    Ok(hour as u32)
}

fn parse_hour_text(text: &str) -> SchedulerResult<u32> {
    let trimmed = text.trim();
    let bad = || SchedulerError::value_error(format!("Invalid working hour '{text}' (expected H, HH or HH:MM)"));
    let is_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

    let (hour, minutes) = match trimmed.split_once(':') {
        Some((hour, minutes)) => (hour, Some(minutes)),
        None => (trimmed, None),
    };
    if !is_digits(hour) || hour.len() > 2 {
        return Err(bad());
    }
    if let Some(minutes) = minutes {
        if !is_digits(minutes) || minutes.len() != 2 {
            return Err(bad());
        }
        if minutes != "00" {
            return Err(SchedulerError::value_error(format!(
                "Working hours must start and end on the hour, got '{text}'"
            )));
        }
    }
    whole_hour(hour.parse().map_err(|_| bad())?)
}

/// Outcome probabilities in [`AppointmentStatus::OUTCOMES`] order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusRates([f64; 4]);

impl Default for StatusRates {
    fn default() -> Self {
        let mut rates = [0.0; 4];
        for (slot, (_, rate)) in rates.iter_mut().zip(DEFAULT_STATUS_RATES) {
            *slot = rate;
        }
        Self(rates)
    }
}

impl StatusRates {
    /// Validate a keyed mapping: exactly the four status keys, values in `[0, 1]`
    /// summing to one within tolerance
    pub fn from_map(map: &BTreeMap<String, f64>) -> SchedulerResult<Self> {
        if let Some(extra) = map.keys().find(|k| !STATUS_KEYS.contains(&k.as_str())) {
            return Err(SchedulerError::value_error(format!(
                "Unknown status_rates key '{extra}' (expected {STATUS_KEYS:?})"
            )));
        }
        let mut rates = [0.0; 4];
        for (slot, key) in rates.iter_mut().zip(STATUS_KEYS) {
            let value = *map.get(key).ok_or_else(|| {
                SchedulerError::value_error(format!("status_rates is missing key '{key}'"))
            })?;
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(SchedulerError::value_error(format!(
                    "status_rates['{key}'] must be in [0, 1], got {value}"
                )));
            }
            *slot = value;
        }
        let sum: f64 = rates.iter().sum();
        if (sum - 1.0).abs() > STATUS_RATE_TOLERANCE {
            return Err(SchedulerError::value_error(format!(
                "status_rates must sum to 1.0, got {sum}"
            )));
        }
        Ok(Self(rates))
    }

    /// Rate of one status; `Scheduled` has no configured rate
    pub fn rate(&self, status: AppointmentStatus) -> f64 {
        status.outcome_index().map_or(0.0, |i| self.0[i])
    }

    /// Rates in outcome order
    pub fn as_array(&self) -> [f64; 4] {
        self.0
    }

    /// Rates keyed by status name
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        STATUS_KEYS.iter().map(|k| k.to_string()).zip(self.0).collect()
    }
}

fn default_status_map() -> BTreeMap<String, f64> {
    StatusRates::default().to_map()
}

/// Command line arguments structure
#[derive(Debug, Clone, Parser)]
#[command(
    name = "medscheduler",
    version = "0.1.0",
    about = "Synthetic outpatient scheduling data generator",
    long_about = "Generates linked slot, appointment and patient tables that mimic real outpatient clinic activity: seasonal booking patterns, lead times, cancellations, no-shows, rebooking and patient demographics.

EXAMPLES:
    # Run with default settings
    medscheduler

    # Use a configuration file
    medscheduler --config config.json

    # Override specific settings
    medscheduler --fill-rate 0.8 --booking-horizon 60 --seed 42

    # Generate configuration template
    medscheduler --print-config > my-config.json

    # Validate configuration without running
    medscheduler --config my-config.json --dry-run

CONFIGURATION:
    Configuration can be provided via:
    1. Command line arguments (highest priority)
    2. Configuration file (--config flag)
    3. Default values (lowest priority)

    Supported configuration file formats: JSON (.json)

    Use --print-config to generate a template configuration file."
)]
pub struct CliArgs {
    /// Configuration file path (JSON format)
    #[arg(
        short,
        long,
        help = "Configuration file path (JSON format)",
        long_help = "Path to a JSON configuration file. CLI arguments will override file settings."
    )]
    pub config: Option<String>,

    /// Random seed for reproducible results
    #[arg(long, help = "Random seed for reproducible results")]
    pub seed: Option<u64>,

    /// Target share of slots that get booked
    #[arg(
        long,
        help = "Fill rate (0.30-1.0)",
        long_help = "Target fraction of slots converted into booked appointments. Range: 0.30-1.0. Default: 0.9"
    )]
    pub fill_rate: Option<f64>,

    /// Maximum days in advance an appointment may be booked
    #[arg(long, help = "Booking horizon in days (0-3650)")]
    pub booking_horizon: Option<i64>,

    /// Median days between booking and appointment
    #[arg(
        long,
        help = "Median lead time in days",
        long_help = "Median number of days between scheduling and appointment. Must be between 1 and the booking horizon. Default: 10"
    )]
    pub median_lead_time: Option<i64>,

    /// Slots per working hour
    #[arg(long, help = "Appointments per hour (1, 2, 3, 4 or 6)")]
    pub appointments_per_hour: Option<i64>,

    /// Rebooking intensity
    #[arg(long, help = "Rebook category (min, med or max)")]
    pub rebook_category: Option<String>,

    /// Reference ("today") date
    #[arg(long, help = "Reference date (YYYY-MM-DD)")]
    pub ref_date: Option<String>,

    /// Directory the CSV tables are written to
    #[arg(
        short,
        long,
        default_value = "output",
        help = "Output directory for CSV tables",
        long_help = "Directory where slots.csv, appointments.csv and patients.csv are written. Created if missing. Default: output"
    )]
    pub output_dir: String,

    /// Directory of reference-data CSV files
    #[arg(
        long,
        help = "Directory of reference-data CSV files",
        long_help = "Directory holding status_rates.csv, month_totals.csv, weekday_shares.csv, age_gender.csv and first_attendance.csv. Tables found there replace the configuration's reference tables; missing or malformed ones fall back to the bundled defaults."
    )]
    pub reference_dir: Option<String>,

    /// Directory for rolling JSON log files
    #[arg(long, help = "Also write JSON logs to this directory")]
    pub log_dir: Option<String>,

    /// Print console log lines as JSON objects
    #[arg(long, help = "Print console logs as JSON")]
    pub log_json: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, help = "Enable debug logging")]
    pub debug: bool,

    /// Dry run mode - validate configuration without running generation
    #[arg(long, help = "Validate configuration without generating data")]
    pub dry_run: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in JSON format and exit")]
    pub print_config: bool,
}

/// Raw scheduler parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Inclusive `(start, end)` ranges to generate slots for
    pub date_ranges: Vec<(DateSpec, DateSpec)>,

    /// "Today": slots before it are past, slots on or after it are future
    pub ref_date: DateSpec,

    /// Weekday indices (0 = Monday) on which the clinic runs
    pub working_days: Vec<i64>,

    /// Slots per working hour, one of 1, 2, 3, 4, 6
    pub appointments_per_hour: i64,

    /// `(start, end)` hour intervals of each working day
    pub working_hours: Vec<(HourSpec, HourSpec)>,

    /// Target fraction of slots that get booked (0.30-1.0)
    pub fill_rate: f64,

    /// Maximum days in advance an appointment may be booked (0-3650)
    pub booking_horizon: i64,

    /// Median days between booking and appointment
    pub median_lead_time: i64,

    /// Outcome shares keyed by status name
    pub status_rates: BTreeMap<String, f64>,

    /// `min`, `med` or `max`
    pub rebook_category: String,

    /// Mean check-in offset in minutes relative to the slot (negative = early)
    pub check_in_time_mean: f64,

    /// Relative noise applied to check-in spread and appointment duration
    pub noise: f64,

    /// Average visits per patient per year
    pub visits_per_year: f64,

    /// Share of appointments that are a patient's first attendance
    pub first_attendance: f64,

    /// Width of the age groups
    pub bin_size: i64,

    /// Minimum patient age
    pub lower_cutoff: i64,

    /// Start of the open-ended age group; maximum age when `truncated`
    pub upper_cutoff: i64,

    /// Whether ages above `upper_cutoff` are excluded
    pub truncated: bool,

    /// Random seed for reproducible results
    pub seed: Option<u64>,

    /// Month (1-12) weight overrides
    pub month_weights: Option<BTreeMap<u32, f64>>,

    /// Weekday (0-6) weight overrides
    pub weekday_weights: Option<BTreeMap<u32, f64>>,

    /// Age-band by sex table override
    pub age_gender_probs: Option<Vec<AgeSexBand>>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            date_ranges: vec![(DateSpec::from("2024-01-01"), DateSpec::from("2024-12-31"))],
            ref_date: DateSpec::from("2024-12-01"),
            working_days: vec![0, 1, 2, 3, 4],
            appointments_per_hour: 4,
            working_hours: vec![(HourSpec::Hour(8), HourSpec::Hour(18))],
            fill_rate: 0.9,
            booking_horizon: 30,
            median_lead_time: 10,
            status_rates: default_status_map(),
            rebook_category: "med".to_string(),
            check_in_time_mean: -10.0,
            noise: 0.1,
            visits_per_year: 1.2,
            first_attendance: DEFAULT_FIRST_ATTENDANCE_RATIO,
            bin_size: 5,
            lower_cutoff: 15,
            upper_cutoff: 90,
            truncated: true,
            seed: None,
            month_weights: None,
            weekday_weights: None,
            age_gender_probs: None,
        }
    }
}

impl SchedulerConfig {
    /// Create configuration from parsed CLI arguments
    pub fn from_cli_args(args: &CliArgs) -> SchedulerResult<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_cli_overrides(args);
        Ok(config)
    }

    /// Load configuration from a JSON file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> SchedulerResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => {}
            Some(ext) => {
                return Err(SchedulerError::value_error(format!(
                    "Unsupported configuration file format: {ext} (supported: .json)"
                )))
            }
            None => {
                return Err(SchedulerError::value_error(
                    "Unsupported configuration file format: no extension (supported: .json)",
                ))
            }
        }
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse configuration from JSON text
    pub fn from_json_str(content: &str) -> SchedulerResult<Self> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_json_value(&value)
    }

    /// Build configuration from a parsed JSON object.
    ///
    /// Every key is checked for the JSON kind it must carry: a wrong kind (a string
    /// seed, a non-boolean `truncated`) is a type error, an unknown key or a bad shape
    /// is a value error. Range checks are left to [`SchedulerConfig::validate`].
    pub fn from_json_value(value: &Value) -> SchedulerResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| SchedulerError::type_error("Configuration must be a JSON object"))?;

        let mut config = Self::default();
        for (key, value) in object {
            let key = key.as_str();
            match key {
                "date_ranges" => config.date_ranges = json::date_ranges(value)?,
                "ref_date" => config.ref_date = json::date_spec(key, value)?,
                "working_days" => config.working_days = json::working_days(value)?,
                "appointments_per_hour" => config.appointments_per_hour = json::integer(key, value)?,
                "working_hours" => config.working_hours = json::working_hours(value)?,
                "fill_rate" => config.fill_rate = json::number(key, value)?,
                "booking_horizon" => config.booking_horizon = json::integer(key, value)?,
                "median_lead_time" => config.median_lead_time = json::integer(key, value)?,
                "status_rates" => config.status_rates = json::number_map(key, value)?,
                "rebook_category" => config.rebook_category = json::string(key, value)?,
                "check_in_time_mean" => config.check_in_time_mean = json::number(key, value)?,
                "noise" => config.noise = json::number(key, value)?,
                "visits_per_year" => config.visits_per_year = json::number(key, value)?,
                "first_attendance" => config.first_attendance = json::number(key, value)?,
                "bin_size" => config.bin_size = json::integer(key, value)?,
                "lower_cutoff" => config.lower_cutoff = json::integer(key, value)?,
                "upper_cutoff" => config.upper_cutoff = json::integer(key, value)?,
                "truncated" => config.truncated = json::boolean(key, value)?,
                "seed" => config.seed = json::seed(value)?,
                "month_weights" => config.month_weights = json::weight_map(key, value)?,
                "weekday_weights" => config.weekday_weights = json::weight_map(key, value)?,
                "age_gender_probs" => config.age_gender_probs = json::age_table(value)?,
                other => {
                    return Err(SchedulerError::value_error(format!(
                        "Unknown configuration key '{other}'"
                    )))
                }
            }
        }
        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(value) = args.seed {
            self.seed = Some(value);
        }
        if let Some(value) = args.fill_rate {
            self.fill_rate = value;
        }
        if let Some(value) = args.booking_horizon {
            self.booking_horizon = value;
        }
        if let Some(value) = args.median_lead_time {
            self.median_lead_time = value;
        }
        if let Some(value) = args.appointments_per_hour {
            self.appointments_per_hour = value;
        }
        if let Some(value) = &args.rebook_category {
            self.rebook_category = value.clone();
        }
        if let Some(value) = &args.ref_date {
            self.ref_date = DateSpec::Text(value.clone());
        }
    }

    /// Set the seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SchedulerResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Print configuration as JSON
    pub fn print_json(&self) -> SchedulerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every parameter and normalize it into a [`ValidatedConfig`]
    pub fn validate(&self) -> SchedulerResult<ValidatedConfig> {
        let date_ranges = resolve_date_ranges(&self.date_ranges)?;

        let ref_date = at_hour_minute(self.ref_date.resolve()?.date(), 0, 0)?;
        let ref_day = ref_date.date();
        if !date_ranges
            .iter()
            .any(|(start, end)| start.date() <= ref_day && ref_day <= end.date())
        {
            return Err(SchedulerError::value_error(format!(
                "ref_date {ref_day} must fall inside one of the date ranges"
            )));
        }

        let mut working_days = Vec::with_capacity(self.working_days.len());
        for day in &self.working_days {
            if !(0..=6).contains(day) {
                return Err(SchedulerError::value_error(format!(
                    "working_days entries must be weekday indices 0-6, got {day}"
                )));
            }
            working_days.push(*day as u32);
        }
        working_days.sort_unstable();
        working_days.dedup();

        let appointments_per_hour = u32::try_from(self.appointments_per_hour)
            .ok()
            .filter(|n| ALLOWED_APPOINTMENTS_PER_HOUR.contains(n))
            .ok_or_else(|| {
                SchedulerError::value_error(format!(
                    "appointments_per_hour must be one of {ALLOWED_APPOINTMENTS_PER_HOUR:?}, got {}",
                    self.appointments_per_hour
                ))
            })?;

        let working_hours = resolve_working_hours(&self.working_hours)?;

        if !self.fill_rate.is_finite() || !(MIN_FILL_RATE..=1.0).contains(&self.fill_rate) {
            return Err(SchedulerError::value_error(format!(
                "fill_rate must be between {MIN_FILL_RATE} and 1.0, got {}",
                self.fill_rate
            )));
        }

        let booking_horizon = u32::try_from(self.booking_horizon)
            .ok()
            .filter(|days| *days <= MAX_BOOKING_HORIZON)
            .ok_or_else(|| {
                SchedulerError::value_error(format!(
                    "booking_horizon must be an integer between 0 and {MAX_BOOKING_HORIZON}, got {}",
                    self.booking_horizon
                ))
            })?;
        if self.median_lead_time < 1 || self.median_lead_time > self.booking_horizon {
            return Err(SchedulerError::value_error(format!(
                "median_lead_time must be between 1 and booking_horizon ({}), got {}",
                self.booking_horizon, self.median_lead_time
            )));
        }
        let median_lead_time = self.median_lead_time as u32;

        let status_rates = StatusRates::from_map(&self.status_rates)?;

        let rebook_category: RebookCategory = self
            .rebook_category
            .parse()
            .map_err(SchedulerError::Value)?;

        let (min_mean, max_mean) = CHECK_IN_MEAN_RANGE;
        if !self.check_in_time_mean.is_finite()
            || !(min_mean..=max_mean).contains(&self.check_in_time_mean)
        {
            return Err(SchedulerError::value_error(format!(
                "check_in_time_mean must be between {min_mean} and {max_mean} minutes, got {}",
                self.check_in_time_mean
            )));
        }
        if !self.noise.is_finite() || self.noise < 0.0 {
            return Err(SchedulerError::value_error(format!(
                "noise must be non-negative, got {}",
                self.noise
            )));
        }
        if !self.visits_per_year.is_finite()
            || self.visits_per_year <= 0.0
            || self.visits_per_year > MAX_VISITS_PER_YEAR
        {
            return Err(SchedulerError::value_error(format!(
                "visits_per_year must be in (0, {MAX_VISITS_PER_YEAR}], got {}",
                self.visits_per_year
            )));
        }
        if !self.first_attendance.is_finite() || !(0.0..=1.0).contains(&self.first_attendance) {
            return Err(SchedulerError::value_error(format!(
                "first_attendance must be between 0.0 and 1.0, got {}",
                self.first_attendance
            )));
        }

        let bin_size = u32::try_from(self.bin_size)
            .ok()
            .filter(|b| (1..=MAX_BIN_SIZE).contains(b))
            .ok_or_else(|| {
                SchedulerError::value_error(format!(
                    "bin_size must be an integer in 1..={MAX_BIN_SIZE}, got {}",
                    self.bin_size
                ))
            })?;
        let lower_cutoff = non_negative("lower_cutoff", self.lower_cutoff)?;
        let upper_cutoff = non_negative("upper_cutoff", self.upper_cutoff)?;
        if self.truncated && lower_cutoff >= upper_cutoff {
            return Err(SchedulerError::value_error(format!(
                "lower_cutoff ({lower_cutoff}) must be below upper_cutoff ({upper_cutoff}) when truncated"
            )));
        }

        let calendar =
            CalendarWeights::from_overrides(self.month_weights.as_ref(), self.weekday_weights.as_ref())?;
        let age_table = match &self.age_gender_probs {
            Some(rows) => AgeSexTable::from_bands(rows)?,
            None => AgeSexTable::default(),
        };
        let upper_limit = self.truncated.then_some(upper_cutoff);
        if age_table.eligible_weights(lower_cutoff, upper_limit).iter().sum::<f64>() <= 0.0 {
            return Err(SchedulerError::value_error(format!(
                "age_gender_probs has no weight between the cutoffs {lower_cutoff} and {upper_cutoff}"
            )));
        }

        Ok(ValidatedConfig {
            date_ranges,
            ref_date,
            working_days,
            appointments_per_hour,
            working_hours,
            fill_rate: self.fill_rate,
            booking_horizon,
            median_lead_time,
            status_rates,
            rebook_category,
            check_in_time_mean: self.check_in_time_mean,
            noise: self.noise,
            visits_per_year: self.visits_per_year,
            first_attendance: self.first_attendance,
            bin_size,
            lower_cutoff,
            upper_cutoff,
            truncated: self.truncated,
            seed: self.seed,
            calendar,
            age_table,
        })
    }
}

fn non_negative(name: &str, value: i64) -> SchedulerResult<u32> {
    u32::try_from(value).map_err(|_| {
        SchedulerError::value_error(format!("{name} must be a non-negative integer, got {value}"))
    })
}

fn resolve_date_ranges(
    ranges: &[(DateSpec, DateSpec)],
) -> SchedulerResult<Vec<(NaiveDateTime, NaiveDateTime)>> {
    if ranges.is_empty() {
        return Err(SchedulerError::value_error("date_ranges must contain at least one range"));
    }
    let mut resolved = Vec::with_capacity(ranges.len());
    for (start, end) in ranges {
        let start = start.resolve()?;
        let mut end = end.resolve()?;
        if end.hour() == 0 && end.minute() == 0 && end.second() == 0 {
            end = at_hour_minute(end.date(), 23, 59)?;
        }
        if start > end {
            return Err(SchedulerError::value_error(format!(
                "date range start {start} is after end {end}"
            )));
        }
        resolved.push((start, end));
    }
    resolved.sort();
    for pair in resolved.windows(2) {
        if pair[1].0 <= pair[0].1 {
            return Err(SchedulerError::value_error(format!(
                "date ranges overlap: {} - {} and {} - {}",
                pair[0].0, pair[0].1, pair[1].0, pair[1].1
            )));
        }
    }
    Ok(resolved)
}

fn resolve_working_hours(hours: &[(HourSpec, HourSpec)]) -> SchedulerResult<Vec<(u32, u32)>> {
    let mut resolved = Vec::with_capacity(hours.len());
    for (start, end) in hours {
        let (start, end) = (start.resolve()?, end.resolve()?);
        if start >= end {
            return Err(SchedulerError::value_error(format!(
                "working hours interval must have start < end, got ({start}, {end})"
            )));
        }
        resolved.push((start, end));
    }
    resolved.sort_unstable();
    for pair in resolved.windows(2) {
        if pair[1].0 < pair[0].1 {
            return Err(SchedulerError::value_error(format!(
                "working hours overlap: {:?} and {:?}",
                pair[0], pair[1]
            )));
        }
    }
    Ok(resolved)
}

/// Normalized parameters, only obtainable from [`SchedulerConfig::validate`]
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct ValidatedConfig {
    /// Sorted, non-overlapping inclusive ranges; end-of-day ends are 23:59
    pub date_ranges: Vec<(NaiveDateTime, NaiveDateTime)>,
    /// Reference date at midnight
    pub ref_date: NaiveDateTime,
    /// Sorted unique weekday indices
    pub working_days: Vec<u32>,
    /// Slots per hour
    pub appointments_per_hour: u32,
    /// Sorted, non-overlapping `(start_hour, end_hour)` intervals
    pub working_hours: Vec<(u32, u32)>,
    /// Target booked share
    pub fill_rate: f64,
    /// Maximum lead time in days
    pub booking_horizon: u32,
    /// Target median lead time in days
    pub median_lead_time: u32,
    /// Outcome shares
    pub status_rates: StatusRates,
    /// Rebooking tier
    pub rebook_category: RebookCategory,
    /// Mean check-in offset in minutes
    pub check_in_time_mean: f64,
    /// Relative timing noise
    pub noise: f64,
    /// Average visits per patient per year
    pub visits_per_year: f64,
    /// First-attendance share
    pub first_attendance: f64,
    /// Age-group width
    pub bin_size: u32,
    /// Minimum age
    pub lower_cutoff: u32,
    /// Open-ended group start / maximum age
    pub upper_cutoff: u32,
    /// Whether `upper_cutoff` bounds ages
    pub truncated: bool,
    /// Seed, if deterministic output was requested
    pub seed: Option<u64>,
    /// Month and weekday multipliers
    pub calendar: CalendarWeights,
    /// Age-band by sex table
    pub age_table: AgeSexTable,
}

impl ValidatedConfig {
    /// Minutes per slot
    pub fn slot_duration_min(&self) -> u32 {
        60 / self.appointments_per_hour
    }

    /// Reference date as a calendar day
    pub fn ref_day(&self) -> NaiveDate {
        self.ref_date.date()
    }

    /// First day covered by the ranges
    pub fn first_date(&self) -> NaiveDate {
        self.date_ranges.first().map_or(self.ref_day(), |(start, _)| start.date())
    }

    /// Last day covered by the ranges
    pub fn last_date(&self) -> NaiveDate {
        self.date_ranges.last().map_or(self.ref_day(), |(_, end)| end.date())
    }

    /// Number of calendar days covered by the ranges
    pub fn span_days(&self) -> i64 {
        self.date_ranges
            .iter()
            .map(|(start, end)| (end.date() - start.date()).num_days() + 1)
            .sum()
    }

    /// Covered span in years
    pub fn span_years(&self) -> f64 {
        self.span_days() as f64 / 365.25
    }

    /// Visit cap per patient over the whole span (at least one)
    pub fn max_visits_per_patient(&self) -> u32 {
        ((self.visits_per_year * self.span_years()).ceil() as u32).max(1)
    }

    /// Upper age bound, if truncation applies
    pub fn upper_limit(&self) -> Option<u32> {
        self.truncated.then_some(self.upper_cutoff)
    }

    /// Last day a future appointment may fall on
    pub fn horizon_end(&self) -> NaiveDate {
        self.ref_day()
            .checked_add_signed(Duration::days(i64::from(self.booking_horizon)))
            .unwrap_or(NaiveDate::MAX)
    }
}

/// JSON field readers that separate wrong kinds (type errors) from bad shapes (value errors)
mod json {
    use super::*;

    fn kind(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    fn wrong_kind(key: &str, expected: &str, value: &Value) -> SchedulerError {
        SchedulerError::type_error(format!("{key} must be {expected}, got {}", kind(value)))
    }

    pub(super) fn number(key: &str, value: &Value) -> SchedulerResult<f64> {
        value.as_f64().ok_or_else(|| wrong_kind(key, "a number", value))
    }

    pub(super) fn integer(key: &str, value: &Value) -> SchedulerResult<i64> {
        value.as_i64().ok_or_else(|| wrong_kind(key, "an integer", value))
    }

    pub(super) fn boolean(key: &str, value: &Value) -> SchedulerResult<bool> {
        value.as_bool().ok_or_else(|| wrong_kind(key, "a boolean", value))
    }

    pub(super) fn string(key: &str, value: &Value) -> SchedulerResult<String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| wrong_kind(key, "a string", value))
    }

    pub(super) fn seed(value: &Value) -> SchedulerResult<Option<u64>> {
        match value {
            Value::Null => Ok(None),
            Value::Number(n) => match (n.as_u64(), n.as_i64()) {
                (Some(seed), _) => Ok(Some(seed)),
                (None, Some(negative)) => Err(SchedulerError::value_error(format!(
                    "seed must be non-negative, got {negative}"
                ))),
                _ => Err(wrong_kind("seed", "an integer", value)),
            },
            other => Err(wrong_kind("seed", "an integer or null", other)),
        }
    }

    pub(super) fn date_spec(key: &str, value: &Value) -> SchedulerResult<DateSpec> {
        value
            .as_str()
            .map(DateSpec::from)
            .ok_or_else(|| wrong_kind(key, "a date string", value))
    }

    pub(super) fn date_ranges(value: &Value) -> SchedulerResult<Vec<(DateSpec, DateSpec)>> {
        let ranges = value
            .as_array()
            .ok_or_else(|| wrong_kind("date_ranges", "a list of [start, end] pairs", value))?;
        ranges
            .iter()
            .map(|pair| match pair.as_array().map(Vec::as_slice) {
                Some([start, end]) => Ok((
                    date_spec("date_ranges", start)?,
                    date_spec("date_ranges", end)?,
                )),
                _ => Err(SchedulerError::value_error(
                    "date_ranges entries must be [start, end] pairs",
                )),
            })
            .collect()
    }

    pub(super) fn working_days(value: &Value) -> SchedulerResult<Vec<i64>> {
        let days = value.as_array().ok_or_else(|| {
            SchedulerError::value_error(format!(
                "working_days must be a list of weekday indices, got {}",
                kind(value)
            ))
        })?;
        days.iter().map(|day| integer("working_days", day)).collect()
    }

    fn hour_spec(value: &Value) -> SchedulerResult<HourSpec> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(hour) => Ok(HourSpec::Hour(hour)),
                None => Ok(HourSpec::Decimal(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(text) => Ok(HourSpec::Text(text.clone())),
            other => Err(wrong_kind("working_hours", "an hour number or string", other)),
        }
    }

    /// Accepts one `[start, end]` pair or a list of pairs
    pub(super) fn working_hours(value: &Value) -> SchedulerResult<Vec<(HourSpec, HourSpec)>> {
        let items = value
            .as_array()
            .ok_or_else(|| wrong_kind("working_hours", "a [start, end] pair or a list of pairs", value))?;
        let is_single_pair = items.len() == 2 && items.iter().all(|v| !v.is_array());
        if is_single_pair {
            return Ok(vec![(hour_spec(&items[0])?, hour_spec(&items[1])?)]);
        }
        items
            .iter()
            .map(|pair| match pair.as_array().map(Vec::as_slice) {
                Some([start, end]) => Ok((hour_spec(start)?, hour_spec(end)?)),
                _ => Err(SchedulerError::value_error(
                    "working_hours entries must be [start, end] pairs",
                )),
            })
            .collect()
    }

    pub(super) fn number_map(key: &str, value: &Value) -> SchedulerResult<BTreeMap<String, f64>> {
        let object = value.as_object().ok_or_else(|| wrong_kind(key, "an object", value))?;
        object
            .iter()
            .map(|(k, v)| Ok((k.clone(), number(key, v)?)))
            .collect()
    }

    pub(super) fn weight_map(key: &str, value: &Value) -> SchedulerResult<Option<BTreeMap<u32, f64>>> {
        if value.is_null() {
            return Ok(None);
        }
        let raw = number_map(key, value)?;
        let mut weights = BTreeMap::new();
        for (k, v) in raw {
            let index: u32 = k.trim().parse().map_err(|_| {
                SchedulerError::value_error(format!("{key} keys must be integers, got '{k}'"))
            })?;
            weights.insert(index, v);
        }
        Ok(Some(weights))
    }

    pub(super) fn age_table(value: &Value) -> SchedulerResult<Option<Vec<AgeSexBand>>> {
        if value.is_null() {
            return Ok(None);
        }
        let rows = value
            .as_array()
            .ok_or_else(|| wrong_kind("age_gender_probs", "a list of rows", value))?;
        rows.iter()
            .map(|row| {
                let object = row
                    .as_object()
                    .ok_or_else(|| wrong_kind("age_gender_probs", "a list of objects", row))?;
                let field = |name: &str| {
                    object.get(name).ok_or_else(|| {
                        SchedulerError::value_error(format!(
                            "age_gender_probs row is missing column '{name}'"
                        ))
                    })
                };
                Ok(AgeSexBand::new(
                    string("age_yrs", field("age_yrs")?)?,
                    number("total_female", field("total_female")?)?,
                    number("total_male", field("total_male")?)?,
                ))
            })
            .collect::<SchedulerResult<Vec<_>>>()
            .map(Some)
    }
}

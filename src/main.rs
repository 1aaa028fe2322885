// Outpatient Scheduling Data Generator - Main Entry Point
//
// You can run it via Cargo:
//
// ```console
// $ cargo build --release
// $ ./target/release/medscheduler --seed 42
// ```
//
// Or with custom configuration:
//
// ```console
// $ ./target/release/medscheduler --config scheduler.json --fill-rate 0.8 --output-dir data --verbose
// ```

use anyhow::{Context, Result};
use clap::Parser;
use medscheduler::reference::{CsvReferenceData, ReferenceDefaults};
use medscheduler::simulation::{AppointmentScheduler, LoggingConfig};
use medscheduler::types::config::CliArgs;
use medscheduler::types::{validate_defaults, SchedulerConfig, ValidatedConfig};
use std::process;
use tracing::{error, info};

fn main() {
    // Parse CLI arguments first to check for special flags
    let args = CliArgs::parse();

    if args.print_config {
        match SchedulerConfig::default().print_json() {
            Ok(json) => {
                println!("{}", json);
                return;
            }
            Err(e) => {
                eprintln!("Failed to serialize default configuration: {}", e);
                process::exit(1);
            }
        }
    }

    // Initialize logging based on CLI flags
    let mut logging = LoggingConfig::from_flags(args.verbose, args.debug);
    if args.log_json {
        logging = logging.with_json_console();
    }
    if let Some(dir) = &args.log_dir {
        logging = logging.with_log_dir(dir);
    }
    // Held until exit so buffered file logs are flushed
    let _guard = match logging.init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            process::exit(1);
        }
    };

    info!("Starting outpatient scheduling data generator");

    if let Err(e) = validate_defaults(false) {
        error!("Bundled reference defaults are invalid: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    let validated = match config.validate() {
        Ok(validated) => validated,
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    info!("Configuration loaded and validated successfully");

    if args.dry_run {
        eprintln!("Configuration validation successful!");
        eprintln!("Dry run mode - no data will be generated.");
        print_configuration_summary(&validated);
        return;
    }

    print_startup_banner(&validated);

    if let Err(e) = run(validated, &args.output_dir) {
        error!("Generation failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }

    info!("Scheduling data generator completed successfully");
}

/// Layer defaults, the config file, reference data and CLI overrides
fn load_config(args: &CliArgs) -> Result<SchedulerConfig> {
    let mut config = SchedulerConfig::from_cli_args(args).context("reading configuration")?;
    if let Some(dir) = &args.reference_dir {
        eprintln!("Loading reference data from {}...", dir);
        let defaults = ReferenceDefaults::resolve(&CsvReferenceData::new(dir));
        if !defaults.fallbacks.is_empty() {
            eprintln!("  Using bundled defaults for: {}", defaults.fallbacks.join(", "));
        }
        defaults.apply_to(&mut config);
        config.apply_cli_overrides(args);
    }
    Ok(config)
}

/// Run every stage and write the tables
fn run(config: ValidatedConfig, output_dir: &str) -> Result<()> {
    let mut scheduler = AppointmentScheduler::from_validated(config);

    eprintln!("Generating slots, appointments and patients...");
    scheduler.generate().context("generating tables")?;

    eprintln!("Writing CSV tables to {}...", output_dir);
    scheduler
        .to_csv(output_dir)
        .with_context(|| format!("writing tables to '{}'", output_dir))?;

    eprintln!();
    eprintln!("{}", scheduler.summarize_slots().context("summarizing slots")?);
    eprintln!("{}", scheduler.statistics());
    Ok(())
}

/// Print startup banner and configuration summary
fn print_startup_banner(config: &ValidatedConfig) {
    eprintln!("Outpatient Scheduling Data Generator");
    eprintln!("====================================");
    eprintln!("Synthetic slots, appointments and patients for outpatient clinics");
    eprintln!();

    print_configuration_summary(config);
}

/// Print configuration summary
fn print_configuration_summary(config: &ValidatedConfig) {
    eprintln!("Configuration:");
    for (start, end) in &config.date_ranges {
        eprintln!("  Date Range: {} to {}", start, end);
    }
    eprintln!("  Reference Date: {}", config.ref_day());
    eprintln!("  Working Days: {:?}", config.working_days);
    eprintln!("  Working Hours: {:?}", config.working_hours);
    eprintln!(
        "  Appointments per Hour: {} ({} min slots)",
        config.appointments_per_hour,
        config.slot_duration_min()
    );
    eprintln!("  Fill Rate: {:.1}%", config.fill_rate * 100.0);
    eprintln!("  Booking Horizon: {} days", config.booking_horizon);
    eprintln!("  Median Lead Time: {} days", config.median_lead_time);
    eprintln!("  Rebook Category: {}", config.rebook_category);
    eprintln!("  First Attendance: {:.1}%", config.first_attendance * 100.0);
    eprintln!("  Visits per Year: {:.2}", config.visits_per_year);
    eprintln!(
        "  Age Cutoffs: {}-{}{}",
        config.lower_cutoff,
        config.upper_cutoff,
        if config.truncated { " (truncated)" } else { "" }
    );
    if let Some(seed) = config.seed {
        eprintln!("  Random Seed: {}", seed);
    }
    eprintln!();
}

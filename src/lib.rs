//! Outpatient Scheduling Data Generator
//!
//! Generates synthetic, reproducible outpatient scheduling datasets: a table of
//! bookable slots, a table of appointments with outcomes, timing and rebooking
//! lineage, and a table of patients linked to those appointments.
//!
//! # Overview
//!
//! Every run is driven by a single seeded random generator, so a fixed seed and
//! configuration produce identical tables. Configuration is validated eagerly and
//! each stage either produces a complete table or fails without touching the
//! tables already computed.
//!
//! ## Key Features
//!
//! - **Working Calendar**: date ranges, working days and hours on a fixed slot grid
//! - **Seasonality**: month and weekday weights bias which past slots get booked
//! - **Lead Times**: booking-to-appointment gaps fitted to a target median
//! - **Outcomes**: attended, cancelled, did-not-attend and unknown at configured rates
//! - **Rebooking**: failed appointments rebooked at one of three intensity tiers
//! - **Patients**: age/sex demographics with first-attendance and follow-up linkage
//!
//! ## Quick Start
//!
//! ```rust
//! use medscheduler::*;
//!
//! let config = SchedulerConfig {
//!     date_ranges: vec![("2024-01-01".into(), "2024-03-31".into())],
//!     ref_date: "2024-03-01".into(),
//!     seed: Some(7),
//!     ..Default::default()
//! };
//!
//! let mut scheduler = AppointmentScheduler::new(config)?;
//! scheduler.generate()?;
//!
//! let stats = scheduler.statistics();
//! println!("{} appointments for {} patients", stats.total_appointments, stats.total_patients);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`types`]: configuration, identifiers, enumerations and bundled constants
//! - [`calendar`]: calendar weights and slot generation
//! - [`appointments`]: lead times, booking, outcomes, punctuality and rebooking
//! - [`patients`]: age/sex table, patient generation and custom columns
//! - [`reference`]: reference-data providers for configuration defaults
//! - [`simulation`]: the pipeline, reports, export, errors and logging
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │   Types     │    │  Calendar   │    │Appointments │
//! │             │    │             │    │             │
//! │ Config      │◄───┤ Weights     │◄───┤ Lead Time   │
//! │ Identifiers │    │ Slots       │    │ Outcomes    │
//! │ Constants   │    │             │    │ Rebooking   │
//! └─────────────┘    └─────────────┘    └─────────────┘
//!        ▲                                      ▲
//!        │                                      │
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  Reference  │    │  Patients   │    │ Simulation  │
//! │             │    │             │    │             │
//! │ Providers   │    │ Age Table   │◄───┤ Scheduler   │
//! │ Fallback    │    │ Linkage     │    │ Summary     │
//! │             │    │ Columns     │    │ Export      │
//! └─────────────┘    └─────────────┘    └─────────────┘
//! ```
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

// Module declarations
pub mod appointments;
pub mod calendar;
pub mod patients;
pub mod reference;
pub mod simulation;

pub mod types;

// Core types and identifiers
pub use types::{
    // Identifiers
    AppointmentId,
    // Enums
    AppointmentStatus,
    DistributionType,
    PatientId,
    RebookCategory,
    // Configuration
    SchedulerConfig,
    Sex,
    SlotId,
    ValidatedConfig,
};

// Calendar
pub use calendar::{generate_slots, CalendarWeights, Slot};

// Appointments
pub use appointments::{Appointment, AppointmentGenerator, LeadTimeDistribution};

// Patients
pub use patients::{AgeSexBand, AgeSexTable, Patient, PatientGenerator};

// Reference data
pub use reference::{BundledReferenceData, CsvReferenceData, ReferenceDataProvider, ReferenceDefaults};

// Simulation
pub use simulation::{
    summarize_slots, AppointmentScheduler, AppointmentStatistics, LoggingConfig, SchedulerError,
    SchedulerResult, SlotSummary,
};

//! Pipeline orchestration, reporting and error handling
//!
//! # Overview
//!
//! - **AppointmentScheduler**: owns the configuration, the random generator and the
//!   slot, appointment and patient tables, and runs the stages in order
//! - **SlotSummary** / **AppointmentStatistics**: structured reports over finished tables
//! - **export**: CSV writers and readers for the three tables
//! - **SchedulerError**: the crate's error type
//! - **LoggingConfig**: tracing subscriber setup
//!
//! # Usage Example
//!
//! ```rust
//! use medscheduler::simulation::AppointmentScheduler;
//! use medscheduler::types::SchedulerConfig;
//!
//! let config = SchedulerConfig {
//!     date_ranges: vec![("2024-01-01".into(), "2024-02-29".into())],
//!     ref_date: "2024-02-01".into(),
//!     seed: Some(42),
//!     ..Default::default()
//! };
//! let mut scheduler = AppointmentScheduler::new(config).unwrap();
//! scheduler.generate().unwrap();
//! assert!(!scheduler.appointments().is_empty());
//! ```

pub mod error;
pub mod export;
pub mod logging;
pub mod scheduler;
pub mod summary;

pub use error::*;
pub use logging::*;
pub use scheduler::*;
pub use summary::*;

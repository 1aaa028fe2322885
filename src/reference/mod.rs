//! Reference data used to seed configuration defaults
//!
//! - **ReferenceDataProvider**: source of status rates, calendar weights, the age/sex
//!   table and the first-attendance ratio
//! - **BundledReferenceData** / **CsvReferenceData**: compiled-in and file-based sources
//! - **ReferenceDefaults**: per-table resolution with fallback to the bundled tables
//!
//! ```rust
//! use medscheduler::reference::{BundledReferenceData, ReferenceDefaults};
//! use medscheduler::types::SchedulerConfig;
//!
//! let defaults = ReferenceDefaults::resolve(&BundledReferenceData);
//! let mut config = SchedulerConfig::default();
//! defaults.apply_to(&mut config);
//! assert!(config.validate().is_ok());
//! ```

pub mod helpers;
pub mod provider;

pub use helpers::*;
pub use provider::*;

//! Core types and identifiers for the scheduler
//!
//! This module contains the fundamental types, identifiers, bundled reference
//! constants and configuration structures used throughout the pipeline.
//!
//! # Overview
//!
//! - **Identifiers**: zero-padded sequence identifiers for slots, appointments and patients
//! - **Enums**: closed enumerations for status, rebooking tier, sex and distribution shape
//! - **Constants**: bundled reference tables and validation limits
//! - **Configuration**: raw and validated scheduler configuration with CLI support
//!
//! # Usage Example
//!
//! ```rust
//! use medscheduler::types::*;
//!
//! let config = SchedulerConfig {
//!     fill_rate: 0.8,
//!     booking_horizon: 45,
//!     ..Default::default()
//! };
//! let validated = config.validate().unwrap();
//! assert_eq!(validated.rebook_category, RebookCategory::Med);
//!
//! let id = SlotId::from_sequence(7, pad_width(1_000));
//! assert_eq!(id.as_str(), "0007");
//! ```

pub mod config;
pub mod constants;
pub mod enums;
pub mod identifiers;

// Re-export all public types for convenience
pub use config::*;
pub use constants::validate_defaults;
pub use enums::*;
pub use identifiers::*;

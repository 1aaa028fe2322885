//! Patient demographics
//!
//! - **AgeSexTable**: reference age-band by sex weights and age-group binning
//! - **PatientGenerator**: synthesizes patients and links them to appointments
//! - **Custom columns**: categorical columns added after generation

pub mod age_table;
pub mod custom_columns;
pub mod generator;

pub use age_table::*;
pub use custom_columns::*;
pub use generator::*;

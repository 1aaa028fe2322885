//! Appointment booking, outcomes, timing and rebooking
//!
//! - **LeadTimeDistribution**: days between booking and appointment, fitted to a median
//! - **Appointment**: one row of the appointment table, plus the finalize helper
//! - **AppointmentGenerator**: books slots and draws outcomes
//! - **PunctualityModel**: check-in, start and end times of attended appointments
//! - **Rebooking**: successors for cancelled and missed appointments

pub mod appointment;
pub mod generator;
pub mod lead_time;
pub mod punctuality;
pub mod rebooking;

pub use appointment::*;
pub use generator::*;
pub use lead_time::*;
pub use punctuality::*;

//! Working calendar: date weighting and slot generation

pub mod generator;
pub mod slot;
pub mod weights;

pub use generator::*;
pub use slot::*;
pub use weights::*;

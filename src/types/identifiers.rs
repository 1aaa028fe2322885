//! Sequence identifiers for slots, appointments and patients
//!
//! Every table uses 1-based sequence numbers rendered as zero-padded strings. The pad
//! width is the digit count of the table's row count, so identifiers sort the same
//! lexically and numerically within one table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of digits needed to render `total` (at least 1)
pub fn pad_width(total: usize) -> usize {
    let mut width = 1;
    let mut rest = total / 10;
    while rest > 0 {
        width += 1;
        rest /= 10;
    }
    width
}

macro_rules! sequence_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Render sequence number `seq` padded to `width` digits
            pub fn from_sequence(seq: usize, width: usize) -> Self {
                Self(format!("{:0width$}", seq, width = width))
            }

            /// Wrap an already-formatted identifier (e.g. read back from a file)
            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// The identifier text
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// The sequence number, if the identifier is numeric
            pub fn sequence(&self) -> Option<usize> {
                self.0.parse().ok()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

sequence_id!(
    /// Identifier of a bookable slot
    SlotId
);

sequence_id!(
    /// Identifier of an appointment
    AppointmentId
);

sequence_id!(
    /// Identifier of a synthesized patient
    PatientId
);

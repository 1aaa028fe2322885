//! Bookable slot record

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::types::SlotId;

/// One bookable calendar unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Zero-padded sequence identifier
    pub slot_id: SlotId,
    /// Calendar date of the slot
    pub appointment_date: NaiveDate,
    /// Start time on the slot grid
    pub appointment_time: NaiveTime,
    /// Whether no appointment has consumed the slot yet
    pub is_available: bool,
}

impl Slot {
    /// Create an available slot
    pub fn new(slot_id: SlotId, appointment_date: NaiveDate, appointment_time: NaiveTime) -> Self {
        Self {
            slot_id,
            appointment_date,
            appointment_time,
            is_available: true,
        }
    }

    /// Slot start as a timestamp
    pub fn datetime(&self) -> NaiveDateTime {
        self.appointment_date.and_time(self.appointment_time)
    }

    /// Mark the slot as booked
    pub fn consume(&mut self) {
        self.is_available = false;
    }
}

//! Enumeration types for the scheduler
//!
//! Closed variant sets for every categorical axis of the generator: appointment
//! outcome, rebooking tier, patient sex and custom-column distribution shape.
//! Unknown tags are rejected when parsing, so nothing downstream needs a fallback arm.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of an appointment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AppointmentStatus {
    /// Patient attended the appointment
    #[serde(rename = "attended")]
    Attended,
    /// Appointment was cancelled (by patient or hospital)
    #[serde(rename = "cancelled")]
    Cancelled,
    /// Patient did not attend
    #[serde(rename = "did not attend")]
    DidNotAttend,
    /// Outcome not recorded
    #[serde(rename = "unknown")]
    Unknown,
    /// Booked for a date on or after the reference date; no outcome yet
    #[serde(rename = "scheduled")]
    Scheduled,
}

impl AppointmentStatus {
    /// The four outcome statuses that carry configured rates, in canonical order
    pub const OUTCOMES: [AppointmentStatus; 4] = [
        AppointmentStatus::Attended,
        AppointmentStatus::Cancelled,
        AppointmentStatus::DidNotAttend,
        AppointmentStatus::Unknown,
    ];

    /// Canonical string key
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Attended => "attended",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::DidNotAttend => "did not attend",
            AppointmentStatus::Unknown => "unknown",
            AppointmentStatus::Scheduled => "scheduled",
        }
    }

    /// Whether an appointment with this status is a candidate for rebooking
    pub fn is_rebookable(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::DidNotAttend)
    }

    /// Index into [`AppointmentStatus::OUTCOMES`], `None` for `Scheduled`
    pub fn outcome_index(&self) -> Option<usize> {
        Self::OUTCOMES.iter().position(|s| s == self)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "attended" => Ok(AppointmentStatus::Attended),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "did not attend" | "dna" => Ok(AppointmentStatus::DidNotAttend),
            "unknown" => Ok(AppointmentStatus::Unknown),
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            _ => Err(format!("Unknown appointment status: {}", s)),
        }
    }
}

/// How aggressively cancelled and missed appointments are rebooked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebookCategory {
    /// Few rebookings, at most one hop
    Min,
    /// Half of failed appointments rebooked, up to two hops
    Med,
    /// Most failed appointments rebooked, up to ten hops
    Max,
}

impl RebookCategory {
    /// Probability that a cancelled or missed appointment gets a successor
    pub fn rebook_ratio(&self) -> f64 {
        match self {
            RebookCategory::Min => 0.2,
            RebookCategory::Med => 0.5,
            RebookCategory::Max => 0.8,
        }
    }

    /// Maximum `rebook_iteration` a successor may reach
    pub fn max_iterations(&self) -> u32 {
        match self {
            RebookCategory::Min => 1,
            RebookCategory::Med => 2,
            RebookCategory::Max => 10,
        }
    }
}

impl fmt::Display for RebookCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebookCategory::Min => write!(f, "min"),
            RebookCategory::Med => write!(f, "med"),
            RebookCategory::Max => write!(f, "max"),
        }
    }
}

impl FromStr for RebookCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "min" => Ok(RebookCategory::Min),
            "med" => Ok(RebookCategory::Med),
            "max" => Ok(RebookCategory::Max),
            _ => Err(format!(
                "Unknown rebook category: {} (expected one of: min, med, max)",
                s
            )),
        }
    }
}

/// Patient sex as recorded in the reference population table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sex {
    /// Male
    Male,
    /// Female
    Female,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => write!(f, "Male"),
            Sex::Female => write!(f, "Female"),
        }
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            _ => Err(format!("Unknown sex: {}", s)),
        }
    }
}

/// Probability shape used when augmenting patients with a categorical column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionType {
    /// Equal probability for every category
    Uniform,
    /// Bell curve centred on the middle of the category sequence
    Normal,
}

impl fmt::Display for DistributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionType::Uniform => write!(f, "uniform"),
            DistributionType::Normal => write!(f, "normal"),
        }
    }
}

impl FromStr for DistributionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "uniform" => Ok(DistributionType::Uniform),
            "normal" => Ok(DistributionType::Normal),
            _ => Err(format!(
                "Unsupported distribution type: {} (expected 'uniform' or 'normal')",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings_round_trip() {
        for status in AppointmentStatus::OUTCOMES {
            assert_eq!(status.as_str().parse::<AppointmentStatus>().unwrap(), status);
        }
        assert_eq!("DNA".parse::<AppointmentStatus>().unwrap(), AppointmentStatus::DidNotAttend);
        assert!("rescheduled".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn test_status_serde_uses_canonical_keys() {
        let json = serde_json::to_string(&AppointmentStatus::DidNotAttend).unwrap();
        assert_eq!(json, "\"did not attend\"");
        let back: AppointmentStatus = serde_json::from_str("\"scheduled\"").unwrap();
        assert_eq!(back, AppointmentStatus::Scheduled);
    }

    #[test]
    fn test_rebookable_statuses() {
        assert!(AppointmentStatus::Cancelled.is_rebookable());
        assert!(AppointmentStatus::DidNotAttend.is_rebookable());
        assert!(!AppointmentStatus::Attended.is_rebookable());
        assert!(!AppointmentStatus::Unknown.is_rebookable());
        assert!(!AppointmentStatus::Scheduled.is_rebookable());
        assert_eq!(AppointmentStatus::Scheduled.outcome_index(), None);
        assert_eq!(AppointmentStatus::Unknown.outcome_index(), Some(3));
    }

    #[test]
    fn test_rebook_category_table() {
        assert_eq!("min".parse::<RebookCategory>().unwrap().max_iterations(), 1);
        assert_eq!("MED".parse::<RebookCategory>().unwrap().max_iterations(), 2);
        assert_eq!("max".parse::<RebookCategory>().unwrap().max_iterations(), 10);
        assert_eq!(RebookCategory::Med.rebook_ratio(), 0.5);
        assert!("extreme".parse::<RebookCategory>().is_err());
    }

    #[test]
    fn test_distribution_type_parsing() {
        assert_eq!("uniform".parse::<DistributionType>().unwrap(), DistributionType::Uniform);
        assert_eq!(" Normal ".parse::<DistributionType>().unwrap(), DistributionType::Normal);
        assert!("triangular".parse::<DistributionType>().is_err());
    }

    #[test]
    fn test_sex_display_and_parse() {
        assert_eq!(Sex::Female.to_string(), "Female");
        assert_eq!("m".parse::<Sex>().unwrap(), Sex::Male);
        assert!("x".parse::<Sex>().is_err());
    }
}

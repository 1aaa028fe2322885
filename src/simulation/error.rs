//! Error types and handling
//!
//! This module contains the error type shared by every stage of the scheduling pipeline.

use thiserror::Error;

/// Errors that can occur while configuring or running the scheduler
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// An argument had the wrong kind of value (e.g. a string where an integer seed is expected)
    #[error("Type error: {0}")]
    Type(String),

    /// An argument had the right kind but violated a domain constraint, a table was
    /// malformed, or a stage was invoked out of order
    #[error("Value error: {0}")]
    Value(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SchedulerError {
    /// Create a type error
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    /// Create a value error
    pub fn value_error(msg: impl Into<String>) -> Self {
        Self::Value(msg.into())
    }

    /// Whether this is a wrong-kind-of-argument error
    pub fn is_type_error(&self) -> bool {
        matches!(self, SchedulerError::Type(_))
    }

    /// Whether this is an out-of-domain-value error
    pub fn is_value_error(&self) -> bool {
        matches!(self, SchedulerError::Value(_))
    }

    /// Get the error category
    pub fn category(&self) -> &'static str {
        match self {
            SchedulerError::Type(_) => "Type",
            SchedulerError::Value(_) => "Value",
            SchedulerError::Io(_) => "IO",
            SchedulerError::Csv(_) => "CSV",
            SchedulerError::Serialization(_) => "Serialization",
        }
    }
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

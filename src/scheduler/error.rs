//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// Horizon outside the supported range
    InvalidHorizon {
        days: i64,
    },

    /// Trigger configuration error
    TriggerConfigError {
        field: String,
        reason: String,
    },

    /// Local wall-clock time does not exist (DST gap)
    NonexistentLocalTime {
        time: String,
    },

    /// Trigger execution error
    TriggerExecutionFailed {
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHorizon { days } => {
                write!(f, "Invalid horizon '{}' days. Must be 0-365", days)
            }
            Self::TriggerConfigError { field, reason } => {
                write!(f, "Trigger config error in '{}': {}", field, reason)
            }
            Self::NonexistentLocalTime { time } => {
                write!(f, "Local time {} does not exist today", time)
            }
            Self::TriggerExecutionFailed { reason } => {
                write!(f, "Trigger execution failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl SchedulerError {
    /// Create an invalid horizon error
    pub fn invalid_horizon(days: i64) -> Self {
        Self::InvalidHorizon { days }
    }

    /// Create a trigger config error
    pub fn trigger_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TriggerConfigError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a trigger execution error
    pub fn execution_failed(reason: impl Into<String>) -> Self {
        Self::TriggerExecutionFailed {
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TriggerExecutionFailed { .. } | Self::NonexistentLocalTime { .. }
        )
    }
}

//! Unified error handling for the takatrack crate
//!
//! Every fallible operation in the library returns [`Result`], whose error
//! type carries enough classification for the HTTP layer to pick a status
//! code and for background jobs to decide whether a failure is worth
//! retrying on the next tick.
//!
//! # Architecture
//!
//! - [`TakatrackErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum
//!
//! # Usage
//!
//! ```rust,ignore
//! use takatrack::error::{Error, TakatrackErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!("will retry: {err}");
//!     } else {
//!         tracing::error!("giving up: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::scheduler::error::SchedulerError;

/// Common trait for all takatrack error types
pub trait TakatrackErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Caller supplied incomplete or malformed input
    Validation,
    /// Referenced record does not exist
    NotFound,
    /// Storage and I/O errors
    Storage,
    /// Subscriber notification failures
    Delivery,
    /// Scheduler and timing errors
    Scheduler,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation => "validation error",
            Self::NotFound => "not found",
            Self::Storage => "storage error",
            Self::Delivery => "delivery error",
            Self::Scheduler => "scheduler error",
            Self::Other => "other error",
        }
    }
}

/// Unified error type for the takatrack crate
#[derive(Error, Debug)]
pub enum Error {
    /// Required field missing or invalid
    #[error("{0}")]
    Validation(String),

    /// Referenced record does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Underlying store operation failed
    #[error("{context}: {source}")]
    Persistence {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A subscriber could not be notified
    #[error("Failed to deliver '{event}' to subscriber {subscriber}")]
    BroadcastDelivery { event: &'static str, subscriber: u64 },

    /// Scheduler and timing errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl TakatrackErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::NotFound { .. } => false,
            // A busy or locked database clears up on its own
            Self::Persistence { source, .. } => matches!(
                source.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            Self::BroadcastDelivery { .. } => true,
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Persistence { .. } | Self::Io(_) => ErrorCategory::Storage,
            Self::BroadcastDelivery { .. } => ErrorCategory::Delivery,
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Json(_) => ErrorCategory::Validation,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Wrap a store failure with the operation that was attempted
    pub fn persistence(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Persistence {
            context: context.into(),
            source,
        }
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }
}

/// Attach operation context to rusqlite failures
pub trait PersistenceContext<T> {
    fn context(self, context: &str) -> Result<T>;
}

impl<T> PersistenceContext<T> for std::result::Result<T, rusqlite::Error> {
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|e| Error::persistence(context, e))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::persistence("Database error", err)
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

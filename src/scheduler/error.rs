//! Error types for the scheduler module

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
///
/// Lock contention and per-campaign failures are not errors; they are
/// reported through [`super::TickReport`].
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Eligible campaigns could not be loaded
    #[error("Failed to load eligible campaigns: {0}")]
    Storage(#[from] StorageError),

    /// The batch panicked outside a campaign crawl
    #[error("Scheduler batch panicked: {0}")]
    BatchPanicked(String),

    /// Scheduler settings are unusable
    #[error("Scheduler config error in '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },
}

impl SchedulerError {
    /// Create an invalid config error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if the next tick might succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_recoverable(),
            Self::BatchPanicked(_) => true,
            Self::InvalidConfig { .. } => false,
        }
    }
}

//! Controller error types

use taskflow_core::{DateRange, TaskError};
use taskflow_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Rejected locally; nothing was applied or dispatched
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("controller has shut down")]
    Shutdown,
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Store(e) => e.is_retryable(),
            SyncError::Task(_) | SyncError::Shutdown => false,
        }
    }

    /// Corrective date range offered by a date conflict.
    pub fn suggestion(&self) -> Option<&DateRange> {
        match self {
            SyncError::Task(e) => e.suggestion(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_is_retryable() {
        assert!(SyncError::from(StoreError::Network("reset".into())).is_retryable());
        assert!(!SyncError::from(StoreError::Concurrency("stale".into())).is_retryable());
        assert!(!SyncError::from(TaskError::validation("title is required")).is_retryable());
        assert!(!SyncError::Shutdown.is_retryable());
    }

    #[test]
    fn test_local_errors_display_verbatim() {
        let err = SyncError::from(TaskError::TaskNotFound("t9".into()));
        assert_eq!(err.to_string(), "task not found: t9");
    }
}

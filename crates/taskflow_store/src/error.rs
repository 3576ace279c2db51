//! Store error types

use thiserror::Error;

/// Errors reported by the authoritative store or the cache around it.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store rejected a write made against stale state
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Transport failure; the write may or may not have landed
    #[error("network error: {0}")]
    Network(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_is_retryable() {
        assert!(StoreError::Network("timeout".into()).is_retryable());
        assert!(!StoreError::Concurrency("stale".into()).is_retryable());
        assert!(!StoreError::Permission("read only".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = StoreError::Permission("principal p1 cannot write".into());
        assert_eq!(err.to_string(), "permission denied: principal p1 cannot write");
    }
}

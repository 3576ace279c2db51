//! Span helpers.
//!
//! The macros declare `error`, `error.message` and `duration_ms` up front so that
//! [`record_error`] and [`record_duration`] have fields to write into.

/// Span around one change travelling through the sync controller.
///
/// ```rust
/// use taskflow_observability::sync_span;
///
/// let span = sync_span!("task:t1", "toggle_action");
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! sync_span {
    ($entity:expr, $operation:expr) => {
        tracing::info_span!(
            "sync.change",
            sync.entity = %$entity,
            sync.operation = $operation,
            error = tracing::field::Empty,
            error.message = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        )
    };
}

/// Span around one call into a store backend.
///
/// ```rust
/// use taskflow_observability::store_span;
///
/// let span = store_span!("memory", "fetch", "acme");
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! store_span {
    ($backend:expr, $operation:expr, $tenant:expr) => {
        tracing::info_span!(
            "store.operation",
            store.backend = $backend,
            store.operation = $operation,
            store.tenant = $tenant,
            error = tracing::field::Empty,
            error.message = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        )
    };
}

/// Marks the current span as failed and logs the error.
pub fn record_error<E: std::error::Error>(error: &E) {
    let span = tracing::Span::current();
    span.record("error", true);
    span.record("error.message", error.to_string());
    tracing::error!(error = %error, "operation failed");
}

/// Records `duration` in milliseconds under `key` on the current span.
pub fn record_duration(key: &str, duration: std::time::Duration) {
    let span = tracing::Span::current();
    span.record(key, duration.as_millis() as u64);
}

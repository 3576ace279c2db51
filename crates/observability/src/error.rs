use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObservabilityError {
    /// Subscriber or exporter could not be installed
    #[error("failed to initialize observability: {0}")]
    InitFailed(String),

    #[error("configuration error: {0}")]
    Config(String),
}

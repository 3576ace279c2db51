//! Logging and tracing setup shared by the taskflow crates.
//!
//! Log lines go to stderr through `tracing-subscriber`. When an OTLP endpoint is
//! configured, spans are also exported through OpenTelemetry. A [`LogSink`] can
//! receive every formatted line, for embedders that show logs in their own UI.
//!
//! ```no_run
//! use taskflow_observability::{ObservabilityConfig, init};
//!
//! let config = ObservabilityConfig::new("taskflow")
//!     .with_log_level("taskflow=debug");
//! init(config)?;
//! tracing::info!("ready");
//! # Ok::<(), taskflow_observability::ObservabilityError>(())
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_SERVICE_NAME` - service name, defaults to `taskflow`
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` - enables OTLP export
//! - `TASKFLOW_LOG` or `RUST_LOG` - filter directives
//! - `TASKFLOW_LOG_CONSOLE` - `0` or `false` silences stderr output

pub mod config;
pub mod error;
pub mod log_sink;
pub mod spans;
pub mod telemetry;

pub use config::{LogSink, ObservabilityConfig};
pub use error::ObservabilityError;
pub use spans::{record_duration, record_error};
pub use telemetry::{init, init_from_env, shutdown};

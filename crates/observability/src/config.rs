//! Logging and trace export settings

use std::env;
use std::fmt;
use std::sync::Arc;

/// Receives each formatted log line. Called from the tracing layer; must not block.
pub type LogSink = Arc<dyn Fn(String) + Send + Sync>;

pub const DEFAULT_SERVICE_NAME: &str = "taskflow";

#[derive(Clone)]
pub struct ObservabilityConfig {
    pub service_name: String,
    /// Reported as "unknown" when unset
    pub service_version: Option<String>,
    /// OTLP gRPC endpoint, e.g. "http://localhost:4317". Export is off when unset.
    pub otlp_endpoint: Option<String>,
    /// fmt layer on stderr
    pub enable_console: bool,
    /// EnvFilter directives, e.g. "warn,taskflow_sync=debug". Falls back to "info".
    pub log_level: Option<String>,
    /// Extra OTel resource attributes such as the tenant a process serves
    pub resource_attributes: Vec<(String, String)>,
    pub log_sink: Option<LogSink>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

impl fmt::Debug for ObservabilityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservabilityConfig")
            .field("service_name", &self.service_name)
            .field("service_version", &self.service_version)
            .field("otlp_endpoint", &self.otlp_endpoint)
            .field("enable_console", &self.enable_console)
            .field("log_level", &self.log_level)
            .field("resource_attributes", &self.resource_attributes)
            .field("log_sink", &self.log_sink.is_some())
            .finish()
    }
}

impl ObservabilityConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: None,
            otlp_endpoint: None,
            enable_console: true,
            log_level: None,
            resource_attributes: Vec::new(),
            log_sink: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = Some(version.into());
        self
    }

    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_console(mut self, enable: bool) -> Self {
        self.enable_console = enable;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    pub fn with_resource_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.resource_attributes.push((key.into(), value.into()));
        self
    }

    /// Tags exported spans with the tenant a process works for.
    pub fn with_tenant(self, tenant_id: impl Into<String>) -> Self {
        self.with_resource_attribute("taskflow.tenant", tenant_id)
    }

    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Environment overrides on top of the defaults:
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `OTEL_SERVICE_NAME` | `service_name` |
    /// | `OTEL_SERVICE_VERSION` | `service_version` |
    /// | `OTEL_EXPORTER_OTLP_ENDPOINT` | `otlp_endpoint` |
    /// | `TASKFLOW_LOG`, then `RUST_LOG` | `log_level` |
    /// | `TASKFLOW_LOG_CONSOLE` (`0`, `false`, `off`) | `enable_console` |
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = env::var("OTEL_SERVICE_NAME") {
            config.service_name = name;
        }
        config.service_version = env::var("OTEL_SERVICE_VERSION").ok();
        config.otlp_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|v| !v.trim().is_empty());
        config.log_level = env::var("TASKFLOW_LOG")
            .or_else(|_| env::var("RUST_LOG"))
            .ok();
        if let Ok(v) = env::var("TASKFLOW_LOG_CONSOLE") {
            config.enable_console = !is_off(&v);
        }

        config
    }
}

fn is_off(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "off" | "no"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ObservabilityConfig::new("taskflow-cli")
            .with_version("0.1.0")
            .with_log_level("debug")
            .with_console(false)
            .with_tenant("acme");
        assert_eq!(config.service_name, "taskflow-cli");
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(!config.enable_console);
        assert_eq!(
            config.resource_attributes,
            vec![("taskflow.tenant".to_string(), "acme".to_string())]
        );
    }

    #[test]
    fn test_debug_hides_sink() {
        let config = ObservabilityConfig::default().with_log_sink(Arc::new(|_| {}));
        let text = format!("{config:?}");
        assert!(text.contains("log_sink: true"));
        assert!(text.contains(DEFAULT_SERVICE_NAME));
    }

    #[test]
    fn test_console_switch_values() {
        assert!(is_off("0"));
        assert!(is_off(" Off "));
        assert!(is_off("false"));
        assert!(!is_off("1"));
        assert!(!is_off("yes"));
    }
}

//! Layer that forwards each event as one formatted line to a [`LogSink`].

use std::fmt::Write;

use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer};

use crate::config::LogSink;

const MAX_LINE_LEN: usize = 8_000;

/// Collects "message key=value ..." from an event.
#[derive(Default)]
struct LineVisitor {
    buf: String,
}

impl LineVisitor {
    fn separate(&mut self) {
        if !self.buf.is_empty() {
            self.buf.push(' ');
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.separate();
        if field.name() == "message" {
            self.buf.push_str(value);
        } else {
            write!(self.buf, "{}={}", field.name(), value).ok();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.separate();
        if field.name() == "message" {
            write!(self.buf, "{:?}", value).ok();
        } else {
            write!(self.buf, "{}={:?}", field.name(), value).ok();
        }
    }
}

/// Formats one event as "[LEVEL] target: message key=value".
fn format_line(event: &tracing::Event<'_>) -> String {
    let meta = event.metadata();
    let mut visitor = LineVisitor::default();
    event.record(&mut visitor);
    let line = if visitor.buf.is_empty() {
        format!("[{}] {}", meta.level(), meta.target())
    } else {
        format!("[{}] {}: {}", meta.level(), meta.target(), visitor.buf)
    };
    if line.len() > MAX_LINE_LEN {
        let head: String = line.chars().take(MAX_LINE_LEN).collect();
        format!("{}... ({} chars)", head, line.len())
    } else {
        line
    }
}

/// The sink is called on the logging thread and must not block.
pub fn log_sink_layer(sink: Option<LogSink>) -> LogSinkLayer {
    LogSinkLayer { sink }
}

#[derive(Clone)]
pub struct LogSinkLayer {
    sink: Option<LogSink>,
}

impl<S> Layer<S> for LogSinkLayer
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if let Some(sink) = &self.sink {
            sink(format_line(event));
        }
    }
}

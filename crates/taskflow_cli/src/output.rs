//! What the user sees. Text mode prints colored lines and tables; JSON mode
//! prints one `{"level", "message", "data"}` object per line on stdout.
//!
//! `console` handles color (NO_COLOR and pipes turn it off), `comfy-table`
//! draws the tree and action tables, `indicatif` spins while a save settles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::Value;
use taskflow_core::TaskStatus;

use crate::cli::OutputFormat;

static JSON: AtomicBool = AtomicBool::new(false);

pub fn init(format: OutputFormat) {
    JSON.store(matches!(format, OutputFormat::Json), Ordering::Relaxed);
}

pub fn is_json() -> bool {
    JSON.load(Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Level {
    Success,
    Info,
    Warning,
    Error,
    Data,
}

#[derive(Serialize)]
struct Line<'a> {
    level: Level,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

fn json_line(level: Level, message: &str, data: Option<Value>) -> String {
    let line = Line {
        level,
        message,
        data,
    };
    serde_json::to_string(&line).unwrap_or_else(|_| {
        serde_json::json!({ "level": "error", "message": message }).to_string()
    })
}

/// JSON mode only. Errors go to stderr, everything else to stdout.
fn emit(level: Level, message: &str, data: Option<Value>) {
    let line = json_line(level, message, data);
    if level == Level::Error {
        eprintln!("{line}");
    } else {
        println!("{line}");
    }
}

pub fn header(text: &str) {
    if !is_json() {
        println!("{}", style(text).bold().cyan());
    }
}

pub fn success(text: &str) {
    if is_json() {
        emit(Level::Success, text, None);
    } else {
        println!("{} {text}", style("✓").green().bold());
    }
}

pub fn error(text: &str) {
    if is_json() {
        emit(Level::Error, text, None);
    } else {
        eprintln!("{} {}", style("✗").red().bold(), style(text).red());
    }
}

pub fn warning(text: &str) {
    if is_json() {
        emit(Level::Warning, text, None);
    } else {
        eprintln!("{} {text}", style("!").yellow().bold());
    }
}

pub fn dim(text: &str) {
    if is_json() {
        emit(Level::Info, text, None);
    } else {
        println!("{}", style(text).dim());
    }
}

/// Machine-readable payload; text mode renders its own view instead.
pub fn data<T: Serialize>(label: &str, value: &T) {
    if is_json() {
        emit(Level::Data, label, serde_json::to_value(value).ok());
    }
}

pub fn kv(key: &str, value: &str) {
    println!("  {:>10} {value}", style(key).cyan());
}

pub fn status_cell(status: TaskStatus) -> Cell {
    let color = match status {
        TaskStatus::Todo => Color::Grey,
        TaskStatus::Doing => Color::Yellow,
        TaskStatus::Blocked => Color::Red,
        TaskStatus::Done => Color::Green,
    };
    Cell::new(status.as_str()).fg(color)
}

const BAR_WIDTH: usize = 10;

/// `"█████░░░░░  50%"`
pub fn progress_bar(progress: u8) -> String {
    let progress = progress.min(100);
    let filled = usize::from(progress) * BAR_WIDTH / 100;
    format!(
        "{}{} {progress:>3}%",
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH - filled)
    )
}

pub fn table(columns: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            columns
                .iter()
                .map(|c| Cell::new(c).add_attribute(Attribute::Bold)),
        );
    table
}

/// Spinner on stderr; hidden in JSON mode.
pub fn spinner(message: &str) -> ProgressBar {
    if is_json() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        bar.set_style(spinner_style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

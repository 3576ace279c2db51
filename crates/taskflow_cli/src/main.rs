//! CLI entry point for taskflow.

mod cli;
mod commands;
mod output;
mod session;

use std::path::Path;

use clap::Parser;
use taskflow_observability::ObservabilityConfig;

use crate::cli::Cli;

/// Load env files: 1) ~/.taskflow/env  2) nearest .env walking up from cwd.
/// Variables already set in the process win over both.
fn load_taskflow_env() {
    if let Some(home) = dirs::home_dir() {
        let config_path = home.join(".taskflow").join("env");
        if config_path.exists() {
            let _ = dotenvy::from_path(&config_path);
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir: &Path = &cwd;
        for _ in 0..32 {
            let env_file = dir.join(".env");
            if env_file.exists() {
                let _ = dotenvy::from_path(&env_file);
                break;
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let mut config = ObservabilityConfig::from_env()
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_tenant(session::identity_from_env().tenant_id);
    if verbose {
        config = config.with_log_level("debug");
    } else if config.log_level.is_none() {
        config = config.with_log_level("warn");
    }
    if let Err(e) = taskflow_observability::init(config) {
        output::warning(&format!("logging disabled: {e}"));
    }
}

#[tokio::main]
async fn main() {
    load_taskflow_env();
    let cli = Cli::parse();
    output::init(cli.output);
    init_logging(cli.verbose);

    let result = commands::handle(cli).await;
    taskflow_observability::shutdown();

    if let Err(e) = result {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

//! semfca - restore or create an authenticated platform session.
//!
//! Reuses `./session.json` when it exists; otherwise logs in with the
//! configured credentials and saves the new session there. Any failure is
//! reported once and the process exits with status 1.

mod commands;
mod prompt;

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter, fmt, prelude::*, EnvFilter};

use semfca_core::{Config, ConsoleReporter, StatusKind, StatusReporter, STATUS_TARGET};

use commands::Command;

/// Exit status for every fatal error
const FAILURE_EXIT_CODE: u8 = 1;

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the log file on drop.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "semfca.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // Status events already reach the terminal as boxes
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_filter(filter::filter_fn(|meta| meta.target() != STATUS_TARGET));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    guard
}

/// Show the failure and record it at error level, with its full cause chain
fn report_failure(reporter: &dyn StatusReporter, err: &anyhow::Error) {
    reporter.report("Error", &format!("{:#}", err), StatusKind::Error);
}

fn load_config() -> Result<Config> {
    let mut config = Config::load().context("Failed to load config")?;
    config
        .apply_env()
        .context("Invalid environment configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let reporter: Arc<dyn StatusReporter> = Arc::new(ConsoleReporter::new());

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            report_failure(reporter.as_ref(), &e);
            return ExitCode::from(FAILURE_EXIT_CODE);
        }
    };

    let _log_guard = init_tracing(config.log_dir.as_deref());
    info!(api = config.api_base_url(), source = ?config.credential_source(), "semfca starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match Command::parse(&args) {
        Ok(command) => commands::execute(command, &config, Arc::clone(&reporter)).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_failure(reporter.as_ref(), &e);
            ExitCode::from(FAILURE_EXIT_CODE)
        }
    }
}

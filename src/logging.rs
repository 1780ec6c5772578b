//! Logging setup
//!
//! Console logging filtered by an `EnvFilter` directive (the `RUST_LOG`
//! variable wins when set), optionally as JSON, plus an optional daily
//! rotating log file.

use crate::error::{BilliardError, Result};
use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log files kept before the oldest is removed.
const MAX_LOG_FILES: usize = 14;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    /// Fallback filter directive, e.g. `info` or `billiard_core=debug`
    pub level: String,
    pub json: bool,
    /// Directory for rotating log files; console only when `None`
    pub log_dir: Option<String>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            log_dir: None,
        }
    }
}

fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| BilliardError::Config(format!("bad log filter {:?}: {}", level, e))),
    }
}

/// Install the global subscriber.
///
/// Hold on to the returned guard for as long as file logging should keep
/// flushing. Fails with a config error when a global subscriber is
/// already installed.
pub fn init_logging(options: &LoggingOptions) -> Result<Option<WorkerGuard>> {
    let (subscriber, guard) = build_subscriber(options)?;
    subscriber
        .try_init()
        .map_err(|e| BilliardError::Config(format!("logging already initialised: {}", e)))?;
    Ok(guard)
}

fn build_subscriber(
    options: &LoggingOptions,
) -> Result<(impl Subscriber + Send + Sync + 'static, Option<WorkerGuard>)> {
    let filter = env_filter(&options.level)?;
    let json_console = options.json.then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
    });
    let plain_console = (!options.json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let (file, guard) = match &options.log_dir {
        Some(dir) => {
            let (writer, guard) = file_writer(Path::new(dir))?;
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(json_console)
        .with(plain_console)
        .with(file);
    Ok((subscriber, guard))
}

fn file_writer(dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("billiard")
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .map_err(|e| BilliardError::Io(e.to_string()))?;
    Ok(tracing_appender::non_blocking(appender))
}

//! Shared logging setup for embedflow binaries.
//!
//! Each run logs to a daily rolled file named after the poller it runs
//! (`<log_dir>/<name>.<date>.log`) and to stderr. The file writer is
//! non-blocking; keep the returned [`LoggingGuard`] alive until exit so
//! buffered lines get flushed.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "embedflow=info,embedflow_poller=info,embedflow_query=info";
const HOME_ENV: &str = "EMBEDFLOW_HOME";
const DEFAULT_MAX_LOG_FILES: usize = 5;

/// Logging options for one process.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// File name prefix, usually `embedflow-<config name>`
    pub name: String,
    /// Mirror the file filter on stderr instead of only showing warnings
    pub verbose: bool,
    /// Overrides `$EMBEDFLOW_HOME/logs`
    pub log_dir: Option<PathBuf>,
    pub rotation: Rotation,
    /// Rolled files kept on disk, oldest deleted first
    pub max_files: usize,
}

impl LogConfig {
    pub fn new(name: &str, verbose: bool) -> Self {
        Self {
            name: file_prefix(name),
            verbose,
            log_dir: None,
            rotation: Rotation::DAILY,
            max_files: DEFAULT_MAX_LOG_FILES,
        }
    }

    /// Name the log after the poller configuration file, so several pollers
    /// sharing a home directory do not interleave their output.
    pub fn for_config_file(config_path: &Path, verbose: bool) -> Self {
        let stem = config_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        if stem.is_empty() {
            Self::new("embedflow", verbose)
        } else {
            Self::new(&format!("embedflow-{}", stem), verbose)
        }
    }

    pub fn with_log_dir(mut self, log_dir: Option<PathBuf>) -> Self {
        self.log_dir = log_dir;
        self
    }

    pub fn resolved_log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(logs_dir)
    }
}

/// Flushes the file writer when dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// When the log directory cannot be prepared, a warning goes to stderr and
/// logging continues on stderr only.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuard> {
    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    let mut guard = None;
    let file_layer = match file_appender(config) {
        Ok(appender) => {
            let (writer, worker_guard) = tracing_appender::non_blocking(appender);
            guard = Some(worker_guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(file_filter),
            )
        }
        Err(err) => {
            eprintln!("Warning: file logging disabled: {:#}", err);
            None
        }
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LoggingGuard { _file: guard })
}

/// Rolling appender for `config`, creating the log directory first.
pub fn file_appender(config: &LogConfig) -> Result<RollingFileAppender> {
    let dir = config.resolved_log_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(config.rotation.clone())
        .filename_prefix(config.name.clone())
        .filename_suffix("log")
        .max_log_files(config.max_files.max(1))
        .build(&dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))
}

/// Get the embedflow home directory: `$EMBEDFLOW_HOME` or `~/.embedflow`.
///
/// Falls back to `./.embedflow` when no home directory can be determined.
pub fn embedflow_home() -> PathBuf {
    if let Ok(override_path) = std::env::var(HOME_ENV) {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".embedflow")
}

/// Get the logs directory: ~/.embedflow/logs
pub fn logs_dir() -> PathBuf {
    embedflow_home().join("logs")
}

/// Keep a file name prefix to characters safe on every platform.
fn file_prefix(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "embedflow".to_string()
    } else {
        cleaned
    }
}

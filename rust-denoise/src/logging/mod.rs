//! Logging initialization.
//!
//! Console output always; a daily-rolling file when `LOG_DIR` is set.
//! Timestamps use the server's local timezone.

use std::path::PathBuf;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::var;
use crate::utils::fs;

/// Default log filter directive, overridden by `RUST_LOG`.
pub const DEFAULT_LOG_FILTER: &str = "rust_denoise=info,tower_http=info";

/// Prefix of rolled log files (`rust-denoise.log.YYYY-MM-DD`).
const LOG_FILE_PREFIX: &str = "rust-denoise.log";

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Console line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging settings, read from the environment before anything else.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub filter: String,
    pub format: LogFormat,
    /// Directory for rolled log files; console only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            format: LogFormat::Pretty,
            log_dir: None,
        }
    }
}

impl LoggingSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Unknown `LOG_FORMAT` values fall back to pretty output.
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = match var(lookup, "LOG_FORMAT").map(|v| v.to_ascii_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        Self {
            filter: var(lookup, "RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            format,
            log_dir: var(lookup, "LOG_DIR").map(PathBuf::from),
        }
    }
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when file logging is on; keep it alive for
/// the lifetime of the process or buffered lines are lost.
pub fn init_logging(settings: &LoggingSettings) -> crate::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&settings.filter)
        .map_err(|e| crate::Error::config(format!("Invalid log filter directive: {}", e)))?;

    let console = match settings.format {
        LogFormat::Pretty => fmt::layer().with_ansi(true).with_timer(LocalTimer).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_timer(LocalTimer)
            .boxed(),
    };

    let (file, guard) = match &settings.log_dir {
        Some(dir) => {
            fs::ensure_dir_all_sync_with_op("creating log directory", dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| {
            crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
        })?;

    Ok(guard)
}

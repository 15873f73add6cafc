//! Logging bootstrap for pvsnap tools
//!
//! Console output goes to stderr so that command output on stdout stays
//! machine readable. A daily rolling file log is added when a log directory
//! is configured.

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{Error, Result};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2026-03-02T08:15:02.113Z [INFO] Saved snapshot 'morning'`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.3fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Keeps the non-blocking file writer alive for the life of the process
static GUARDS: OnceLock<Mutex<Vec<WorkerGuard>>> = OnceLock::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Used as the log file prefix
    pub app_name: String,
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
    /// Directory for the daily rolling file log; console only when `None`
    pub log_dir: Option<PathBuf>,
    /// Colored console output
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "pvsnap".to_string(),
            level: "info".to_string(),
            log_dir: None,
            ansi: true,
        }
    }
}

/// Build the filter: `RUST_LOG` wins over the configured level
fn build_filter(level: &str) -> Result<EnvFilter> {
    match std::env::var("RUST_LOG") {
        Ok(env) if !env.trim().is_empty() => EnvFilter::try_new(env)
            .map_err(|e| Error::Logging(format!("Invalid RUST_LOG: {}", e))),
        _ => EnvFilter::try_new(level)
            .map_err(|e| Error::Logging(format!("Invalid log level '{}': {}", level, e))),
    }
}

/// Initialize logging system with configuration
///
/// Fails if a global subscriber is already installed.
pub fn init_with_config(config: LogConfig) -> Result<()> {
    let filter = build_filter(&config.level)?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi)
        .event_format(BracketedLevelFormat)
        .boxed();

    let file_layer = match &config.log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", config.app_name));
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            let guards = GUARDS.get_or_init(|| Mutex::new(Vec::new()));
            match guards.lock() {
                Ok(mut guards) => guards.push(guard),
                Err(poisoned) => poisoned.into_inner().push(guard),
            }

            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat)
                    .boxed(),
            )
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    if let Some(dir) = &config.log_dir {
        tracing::debug!("Writing logs to {}", dir.display());
    }
    Ok(())
}

/// Filter directive for a `-v` count: 0 keeps `default`, then debug, then trace
pub fn level_for_verbosity(verbose: u8, default: &str) -> String {
    match verbose {
        0 => default.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_format_level() {
        assert_eq!(format_level(&Level::WARN), "[WARN]");
        assert_eq!(format_level(&Level::TRACE), "[TRACE]");
    }

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for_verbosity(0, "warn"), "warn");
        assert_eq!(level_for_verbosity(1, "warn"), "debug");
        assert_eq!(level_for_verbosity(5, "warn"), "trace");
    }

    #[test]
    #[serial]
    fn test_filter_prefers_rust_log() {
        std::env::set_var("RUST_LOG", "pvsnap=trace");
        let filter = build_filter("info").unwrap();
        assert!(filter.to_string().contains("pvsnap=trace"));
        std::env::remove_var("RUST_LOG");

        let filter = build_filter("warn").unwrap();
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    #[serial]
    fn test_invalid_level_is_rejected() {
        std::env::remove_var("RUST_LOG");
        assert!(matches!(build_filter("pvsnap=loud"), Err(Error::Logging(_))));
    }
}

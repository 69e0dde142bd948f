//! Unified logging module for the ASA manager
//!
//! Console output always uses the bracketed `timestamp [LEVEL] message`
//! format. An optional daily rolling file (plain or JSON) is written through
//! a non-blocking appender.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use errors::{AsaError, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{
        self,
        format::{FmtSpan, Writer},
        FmtContext, FormatEvent, FormatFields,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

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

/// Event formatter that outputs: `timestamp [LEVEL] message key=value`
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
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m",
                Level::DEBUG => "\x1b[34m",
                Level::INFO => "\x1b[32m",
                Level::WARN => "\x1b[33m",
                Level::ERROR => "\x1b[31m",
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
static FILE_GUARD: OnceLock<Mutex<Option<WorkerGuard>>> = OnceLock::new();

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, also the log file prefix and the debug filter target
    pub service_name: String,
    /// Base directory for log files
    pub log_dir: PathBuf,
    /// Global level applied to every target
    pub console_level: Level,
    /// Level applied to the service's own target
    pub file_level: Level,
    /// Emit JSON lines in the log file instead of the bracketed format
    pub enable_json: bool,
    /// Write a daily rolling log file in addition to the console
    pub enable_file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "asamanager".to_string(),
            log_dir: PathBuf::from("logs"),
            console_level: Level::INFO,
            file_level: Level::DEBUG,
            enable_json: false,
            enable_file: false,
        }
    }
}

/// Parse a level name, falling back to `default` on anything unknown
pub fn parse_level(level: &str, default: Level) -> Level {
    level.trim().parse().unwrap_or(default)
}

/// Build the filter directive used when `RUST_LOG` is not set
///
/// Example: `info,asamanager=debug`
pub fn default_filter(config: &LogConfig) -> String {
    format!(
        "{},{}={}",
        config.console_level.as_str().to_lowercase(),
        config.service_name.replace('-', "_"),
        config.file_level.as_str().to_lowercase()
    )
}

/// Initialize logging system with configuration
///
/// `RUST_LOG`, when set, replaces the computed filter entirely.
pub fn init_with_config(config: LogConfig) -> Result<()> {
    let filter_str = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter(&config));
    let env_filter = EnvFilter::try_new(&filter_str)
        .map_err(|e| AsaError::Configuration(format!("Invalid log filter '{}': {}", filter_str, e)))?;

    let console_layer = fmt::layer()
        .with_ansi(true)
        .event_format(BracketedLevelFormat)
        .boxed();

    let file_layer = if config.enable_file {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = tracing_appender::rolling::daily(
            &config.log_dir,
            format!("{}.log", config.service_name),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        let slot = FILE_GUARD.get_or_init(|| Mutex::new(None));
        match slot.lock() {
            Ok(mut slot) => *slot = Some(guard),
            Err(poisoned) => *poisoned.into_inner() = Some(guard),
        }

        let layer = if config.enable_json {
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_level(true)
                .with_target(true)
                .with_span_events(FmtSpan::CLOSE)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .event_format(BracketedLevelFormat)
                .boxed()
        };
        Some(layer)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AsaError::Configuration(format!("Logging already initialized: {}", e)))?;

    tracing::info!(
        "Logging: {} @ {:?} (filter: {})",
        config.service_name,
        config.log_dir,
        filter_str
    );

    Ok(())
}

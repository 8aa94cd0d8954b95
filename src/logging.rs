//! Structured logging setup.
//!
//! The library itself only emits `tracing` events (targets under `brrtdoc`);
//! hosts that do not install their own subscriber can call
//! [`init_logging`] or [`init_logging_with_config`] once at startup.
//!
//! Configuration comes from the environment:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `BRRTDOC_LOG_LEVEL` | `info` | trace/debug/info/warn/error |
//! | `BRRTDOC_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `BRRTDOC_LOG_TARGET_FILTER` | unset | extra comma-separated `EnvFilter` directives |
//! | `BRRTDOC_LOG_INCLUDE_LOCATION` | `false` | include file and line |
//! | `BRRTDOC_LOG_ASYNC` | `false` | write through a non-blocking appender |
//!
//! `RUST_LOG`, when set, takes precedence over `BRRTDOC_LOG_LEVEL`.

use anyhow::Context as _;
use std::env;
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Output encoding of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, with span context.
    #[default]
    Json,
    /// Multi-line human readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("json") {
            Ok(LogFormat::Json)
        } else if s.eq_ignore_ascii_case("pretty") {
            Ok(LogFormat::Pretty)
        } else {
            Err(format!("unknown log format '{s}'"))
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Additional `EnvFilter` directives, comma-separated.
    pub target_filter: Option<String>,
    pub include_location: bool,
    pub async_logging: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            target_filter: None,
            include_location: false,
            async_logging: false,
        }
    }
}

fn parse_level(raw: &str) -> Option<Level> {
    Level::from_str(raw.trim()).ok()
}

impl LogConfig {
    /// Read `BRRTDOC_LOG_*`. Unset or unparseable values keep their default.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            level: env::var("BRRTDOC_LOG_LEVEL")
                .ok()
                .and_then(|v| parse_level(&v))
                .unwrap_or(defaults.level),
            format: env::var("BRRTDOC_LOG_FORMAT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.format),
            target_filter: env::var("BRRTDOC_LOG_TARGET_FILTER").ok().filter(|v| !v.is_empty()),
            include_location: env_bool("BRRTDOC_LOG_INCLUDE_LOCATION").unwrap_or(defaults.include_location),
            async_logging: env_bool("BRRTDOC_LOG_ASYNC").unwrap_or(defaults.async_logging),
        }
    }

    /// Pretty, `debug`, with file and line.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            include_location: true,
            ..Self::default()
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_str()));

        for directive in self
            .target_filter
            .iter()
            .flat_map(|f| f.split(','))
            .map(str::trim)
            .filter(|d| !d.is_empty())
        {
            match directive.parse() {
                Ok(parsed) => filter = filter.add_directive(parsed),
                Err(err) => eprintln!("brrtdoc: ignoring log directive '{directive}': {err}"),
            }
        }
        filter
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Initialize logging at `log_level`, taking everything else from the environment.
///
/// ```no_run
/// let _guard = brrtdoc::logging::init_logging("debug")?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logging(log_level: &str) -> anyhow::Result<Option<WorkerGuard>> {
    let mut config = LogConfig::from_env();
    if let Some(level) = parse_level(log_level) {
        config.level = level;
    }
    init_logging_with_config(&config)
}

/// Install a global subscriber for `config`.
///
/// With `async_logging` the returned guard must be held for the life of the
/// process; dropping it flushes and stops the background writer. Installing a
/// second subscriber is an error.
pub fn init_logging_with_config(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let (writer, guard) = if config.async_logging {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
        (BoxMakeWriter::new(non_blocking), Some(guard))
    } else {
        (BoxMakeWriter::new(std::io::stdout), None)
    };

    let layer = fmt::layer()
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_writer(writer);
    let layer = match config.format {
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_thread_ids(true)
            .boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(guard)
}

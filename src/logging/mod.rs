//! Tracing subscriber setup
//!
//! One console layer in the configured format, plus a daily-rotated file
//! layer when enabled. `TASKSLOT_LOG` takes any `EnvFilter` directive and
//! replaces the configured level, e.g.
//! `TASKSLOT_LOG=taskslot::domain::task::scheduler=trace`.

use std::path::PathBuf;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

const ENV_FILTER_VAR: &str = "TASKSLOT_LOG";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Resolved logging settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level for `taskslot` targets unless `TASKSLOT_LOG` is set
    pub level: Level,
    pub format: LogFormat,
    pub timestamps: bool,
    /// Source file and line on every event, console and file alike
    pub file_line: bool,
    pub file_output: bool,
    /// Directory for rotated log files; platform data dir when unset
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            timestamps: true,
            file_line: false,
            file_output: false,
            file_path: None,
        }
    }
}

impl LoggingConfig {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(ENV_FILTER_VAR).unwrap_or_else(|_| {
            EnvFilter::new(format!("taskslot={}", self.level.as_str().to_lowercase()))
        })
    }

    fn log_dir(&self) -> PathBuf {
        self.file_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("taskslot")
                .join("logs")
        })
    }
}

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

/// Unknown names fall back to `Pretty`.
impl From<&str> for LogFormat {
    fn from(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

fn console_layer(config: &LoggingConfig) -> BoxedLayer {
    let layer = fmt::layer()
        .with_target(true)
        .with_file(config.file_line)
        .with_line_number(config.file_line);

    match (config.format, config.timestamps) {
        (LogFormat::Json, true) => layer.json().boxed(),
        (LogFormat::Json, false) => layer.json().without_time().boxed(),
        (LogFormat::Compact, true) => layer.compact().boxed(),
        (LogFormat::Compact, false) => layer.compact().without_time().boxed(),
        (LogFormat::Pretty, true) => layer.boxed(),
        (LogFormat::Pretty, false) => layer.without_time().boxed(),
    }
}

fn file_layer(config: &LoggingConfig) -> Option<BoxedLayer> {
    if !config.file_output {
        return None;
    }

    let dir = config.log_dir();
    let appender = std::fs::create_dir_all(&dir)
        .map_err(|e| e.to_string())
        .and_then(|()| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("taskslot")
                .filename_suffix("log")
                .build(&dir)
                .map_err(|e| e.to_string())
        });

    match appender {
        Ok(appender) => Some(
            fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(config.file_line)
                .with_line_number(config.file_line)
                .with_span_events(FmtSpan::CLOSE)
                .boxed(),
        ),
        Err(e) => {
            eprintln!("taskslot: file logging disabled, {}: {e}", dir.display());
            None
        }
    }
}

/// Install the global subscriber. A second call leaves the first one in
/// place.
pub fn init_logging(config: &LoggingConfig) {
    let mut layers = vec![console_layer(config)];
    layers.extend(file_layer(config));

    let installed = tracing_subscriber::registry()
        .with(layers)
        .with(config.filter())
        .try_init();

    match installed {
        Ok(()) => tracing::debug!(
            level = %config.level,
            format = ?config.format,
            file_output = config.file_output,
            "Logging initialized"
        ),
        Err(e) => eprintln!("taskslot: subscriber already set: {e}"),
    }
}

/// Level from a config string; accepts `warning` and defaults to INFO
pub fn parse_level(s: &str) -> Level {
    match s.trim().to_ascii_lowercase().as_str() {
        "warning" => Level::WARN,
        other => other.parse().unwrap_or(Level::INFO),
    }
}

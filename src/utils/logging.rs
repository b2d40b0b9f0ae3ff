use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Once;

use anyhow::{anyhow, Context};
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::config::MonitoringConfig;

static INIT: Once = Once::new();

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level when `RUST_LOG` is not set
    pub level: Level,
    /// Whether to include source code locations
    pub source_location: bool,
    /// Whether to log span open/close (one span per generation session)
    pub log_spans: bool,
    /// Output file path (None for stderr)
    pub file_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            source_location: false,
            log_spans: false,
            file_path: None,
        }
    }
}

impl From<&MonitoringConfig> for LogConfig {
    fn from(config: &MonitoringConfig) -> Self {
        Self {
            level: config.log_level.into(),
            ..Default::default()
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Only the first call in a process has any effect; later calls return `Ok`.
pub fn setup_logging(config: LogConfig) -> anyhow::Result<()> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = setup_logging_internal(config);
    });

    result
}

fn setup_logging_internal(config: LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.level).into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(true)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(if config.log_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    if let Some(path) = config.file_path {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        builder
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .try_init()
            .map_err(|e| anyhow!("Failed to set global subscriber: {}", e))?;
    } else {
        builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow!("Failed to set global subscriber: {}", e))?;
    }

    Ok(())
}

//! Logging configuration

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::GatewayError;

/// Parse a level name such as `info` or `WARN`; `warning` is accepted too
pub fn parse_level(value: &str) -> Result<Level, GatewayError> {
    let value = value.trim();
    let name = if value.eq_ignore_ascii_case("warning") { "warn" } else { value };
    name.parse::<Level>()
        .map_err(|_| GatewayError::ConfigError(format!("Invalid log level: {}", value)))
}

/// Logging options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Default level; `RUST_LOG` takes precedence
    pub log_level: Level,

    /// Write logs to stdout
    pub stdout: bool,

    /// Directory for daily-rolling log files; no file output when unset
    pub log_dir: Option<PathBuf>,

    /// Enable JSON format
    pub json_format: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            stdout: true,
            log_dir: None,
            json_format: false,
        }
    }
}

const LOG_FILE_PREFIX: &str = "nexus-gateway.log";

/// Initialize logging.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the life of the process.
pub fn init_logging(options: LogOptions) -> Result<Option<WorkerGuard>, GatewayError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.as_str().to_lowercase()));

    let (file_layer, guard) = match &options.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let plain = (options.stdout && !options.json_format).then(fmt::layer);
    let json = (options.stdout && options.json_format).then(|| fmt::layer().json());

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(plain)
        .with(json)
        .try_init()
        .map_err(|e| GatewayError::ConfigError(e.to_string()))?;

    Ok(guard)
}

//! Logging configuration and initialization
//!
//! Centralized `tracing` setup for hosts that do not bring their own
//! subscriber (standalone tools, tests). Engines embedding this crate
//! normally install their own subscriber and never call into here.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: standard tracing filter, takes precedence
//!   (e.g. "info", "debug,bufferforge=trace")
//! - `BUFFERFORGE_LOG_LEVEL`: simple level (error, warn, info, debug, trace)
//! - `BUFFERFORGE_LOG_FORMAT`: "human" (default) or "json"

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracks whether a subscriber has been installed by this crate
static TRACING_INITIALIZED: OnceCell<()> = OnceCell::new();

const LOG_LEVEL_ENV: &str = "BUFFERFORGE_LOG_LEVEL";
const LOG_FORMAT_ENV: &str = "BUFFERFORGE_LOG_FORMAT";

/// Log level selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable console output (default)
    #[default]
    Human,
    /// JSON structured output for log aggregation
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" | "pretty" | "console" => Some(LogFormat::Human),
            "json" | "structured" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Read level and format from the environment.
    pub fn from_env() -> Self {
        let level = std::env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|s| LogLevel::parse(&s))
            .unwrap_or_default();
        let format = std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|s| LogFormat::parse(&s))
            .unwrap_or_default();
        LoggingConfig { level, format }
    }
}

/// Initialize logging from the environment. Idempotent: only the first
/// call installs a subscriber.
pub fn init_logging_default() {
    init_with_config(&LoggingConfig::from_env());
}

/// Initialize logging with an explicit configuration. Idempotent.
pub fn init_with_config(config: &LoggingConfig) {
    let config = *config;
    TRACING_INITIALIZED.get_or_init(move || {
        // RUST_LOG wins over the configured level, per tracing convention.
        let env_filter = match std::env::var("RUST_LOG") {
            Ok(filter) => {
                EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"))
            }
            Err(_) => EnvFilter::new(config.level.as_filter_str()),
        };

        let registry = tracing_subscriber::registry().with(env_filter);
        let result = match config.format {
            LogFormat::Human => registry
                .with(fmt::layer().with_target(true))
                .try_init(),
            LogFormat::Json => registry
                .with(fmt::layer().json().with_target(false))
                .try_init(),
        };
        // Another subscriber may already be installed by the host; that is
        // fine, logs flow there instead.
        if let Err(err) = result {
            eprintln!("bufferforge: logging init skipped: {}", err);
        }
    });
}

/// Check if this crate installed a subscriber
pub fn is_initialized() -> bool {
    TRACING_INITIALIZED.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("INFO"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("human"), Some(LogFormat::Human));
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Human));
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_config_builder() {
        let config = LoggingConfig::new()
            .with_level(LogLevel::Debug)
            .with_format(LogFormat::Json);
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var(LOG_LEVEL_ENV, "debug");
        std::env::set_var(LOG_FORMAT_ENV, "json");
        let config = LoggingConfig::from_env();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);

        std::env::remove_var(LOG_LEVEL_ENV);
        std::env::remove_var(LOG_FORMAT_ENV);
        let config = LoggingConfig::from_env();
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.format, LogFormat::Human);
    }

    #[test]
    #[serial]
    fn test_init_is_idempotent() {
        init_logging_default();
        init_logging_default();
        init_logging_default();
        assert!(is_initialized());
    }
}

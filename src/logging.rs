//! Logging configuration with file rotation and a reloadable level
//!
//! This module provides:
//! - stderr logging, plain or structured JSON
//! - File-based logging with daily rotation
//! - A handle to change the level at runtime, used when the host asks for a
//!   different log level

use crate::config::LoggingConfig;
use crate::error::{BridgeError, Result};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, reload, EnvFilter, Registry,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level
    pub level: Level,

    /// Log to file
    pub file_path: Option<PathBuf>,

    /// Log to stderr
    pub stderr: bool,

    /// Emit JSON lines instead of plain text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file_path: None,
            stderr: true,
            json: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            if let Some(level) = level_in(&rust_log) {
                config.level = level;
            }
        }

        if let Ok(log_file) = std::env::var("LIGHTWAVE_LOG_FILE") {
            config.file_path = Some(PathBuf::from(log_file));
        }

        if let Ok(log_stderr) = std::env::var("LIGHTWAVE_LOG_STDERR") {
            config.stderr = log_stderr.to_lowercase() != "false";
        }

        config
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.parse().unwrap_or(Level::INFO),
            file_path: config.file.clone(),
            stderr: true,
            json: config.json_format,
        }
    }
}

// Most verbose level named in a RUST_LOG value
fn level_in(rust_log: &str) -> Option<Level> {
    let rust_log = rust_log.to_lowercase();
    [
        ("trace", Level::TRACE),
        ("debug", Level::DEBUG),
        ("info", Level::INFO),
        ("warn", Level::WARN),
        ("error", Level::ERROR),
    ]
    .into_iter()
    .find(|(name, _)| rust_log.contains(name))
    .map(|(_, level)| level)
}

/// Changes the active log level after logging has been initialized
#[derive(Clone)]
pub struct LogLevelHandle {
    inner: reload::Handle<EnvFilter, Registry>,
}

impl LogLevelHandle {
    /// Replace the active filter with one at `level`
    pub fn set_level(&self, level: Level) -> Result<()> {
        self.inner
            .reload(level_filter(level))
            .map_err(|e| BridgeError::config(format!("Failed to change log level: {e}")))
    }

    /// Active filter directives, if the subscriber is still alive
    pub fn current(&self) -> Option<String> {
        self.inner.with_current(|filter| filter.to_string()).ok()
    }
}

impl std::fmt::Debug for LogLevelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogLevelHandle")
            .field("current", &self.current())
            .finish()
    }
}

fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .parse_lossy("")
}

/// Filter layer whose level can be changed through the returned handle
pub fn reloadable_filter(level: Level) -> (reload::Layer<EnvFilter, Registry>, LogLevelHandle) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();
    let (layer, inner) = reload::Layer::new(env_filter);
    (layer, LogLevelHandle { inner })
}

/// Initialize logging with the given configuration
pub fn init_logging(config: LogConfig) -> Result<LogLevelHandle> {
    let (filter, handle) = reloadable_filter(config.level);

    let stderr_text = (config.stderr && !config.json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
    });
    let stderr_json = (config.stderr && config.json).then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
    });

    let file_layer = match &config.file_path {
        Some(file_path) => {
            let directory = file_path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            std::fs::create_dir_all(directory)?;

            let file_appender = tracing_appender::rolling::daily(
                directory,
                file_path
                    .file_name()
                    .unwrap_or_else(|| std::ffi::OsStr::new("lightwave-bridge.log")),
            );
            Some(fmt::layer().with_writer(file_appender).with_ansi(false))
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_text)
        .with(stderr_json)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| BridgeError::config(format!("Failed to install logger: {e}")))?;

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env() {
        temp_env::with_vars(
            [
                ("RUST_LOG", Some("lightwave_bridge=debug")),
                ("LIGHTWAVE_LOG_FILE", Some("/tmp/lightwave/bridge.log")),
                ("LIGHTWAVE_LOG_STDERR", Some("false")),
            ],
            || {
                let config = LogConfig::from_env();
                assert_eq!(config.level, Level::DEBUG);
                assert_eq!(
                    config.file_path,
                    Some(PathBuf::from("/tmp/lightwave/bridge.log"))
                );
                assert!(!config.stderr);
            },
        );
    }

    #[test]
    fn test_from_logging_config() {
        let logging = LoggingConfig {
            level: "warn".to_string(),
            json_format: true,
            file: None,
        };
        let config = LogConfig::from(&logging);
        assert_eq!(config.level, Level::WARN);
        assert!(config.json);
    }

    #[test]
    fn test_level_in_picks_most_verbose() {
        assert_eq!(level_in("info,lightwave_bridge=trace"), Some(Level::TRACE));
        assert_eq!(level_in("WARN"), Some(Level::WARN));
        assert_eq!(level_in("lightwave_bridge"), None);
    }

    #[test]
    #[serial]
    fn test_handle_changes_level() {
        temp_env::with_var_unset("RUST_LOG", || {
            let (filter, handle) = reloadable_filter(Level::INFO);
            let _subscriber = tracing_subscriber::registry().with(filter);

            handle.set_level(Level::DEBUG).unwrap();

            let current = handle.current().unwrap();
            assert!(current.contains("debug"), "unexpected filter: {current}");
        });
    }

    #[test]
    fn test_handle_outlives_subscriber() {
        let (filter, handle) = reloadable_filter(Level::INFO);
        drop(filter);

        assert!(handle.current().is_none());
        assert!(handle.set_level(Level::DEBUG).is_err());
    }
}

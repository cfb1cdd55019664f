//! Logging configuration
//!
//! Settings for the tracing subscriber installed by the binary. Log files roll
//! over on the configured schedule; only the newest `max_log_files` are kept.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// When the log file rolls over to a new one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// New file every hour
    Hourly,
    /// New file every day
    #[default]
    Daily,
    /// One file for ever
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Write to stderr
    pub console_output: bool,
    /// Write rolling files to `log_dir`
    pub file_output: bool,
    /// Directory for log files
    pub log_dir: PathBuf,
    /// Roll-over schedule of the log file
    pub rotation: LogRotation,
    /// Rolled files kept on disk
    pub max_log_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_dir: PathBuf::from("logs"),
            rotation: LogRotation::Daily,
            max_log_files: 7,
        }
    }
}

impl LogConfig {
    /// Configuration with debug level (the `--debug` flag)
    pub fn with_debug(mut self) -> Self {
        self.level = "debug".to_string();
        self
    }

    /// Parse the level, falling back to INFO
    pub fn parse_level(&self) -> tracing::Level {
        self.level
            .trim()
            .parse::<tracing::Level>()
            .unwrap_or(tracing::Level::INFO)
    }

    /// Create the log directory when file output is enabled
    pub fn ensure_log_directory(&self) -> std::io::Result<()> {
        if self.file_output {
            std::fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        let mut config = LogConfig::default();
        assert_eq!(config.parse_level(), tracing::Level::INFO);
        config.level = "DEBUG".to_string();
        assert_eq!(config.parse_level(), tracing::Level::DEBUG);
        config.level = "loud".to_string();
        assert_eq!(config.parse_level(), tracing::Level::INFO);
        assert_eq!(
            LogConfig::default().with_debug().parse_level(),
            tracing::Level::DEBUG
        );
    }

    #[test]
    fn test_log_directory_only_for_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LogConfig {
            log_dir: dir.path().join("fire-logs"),
            ..LogConfig::default()
        };
        config.ensure_log_directory().unwrap();
        assert!(!config.log_dir.exists());

        config.file_output = true;
        config.ensure_log_directory().unwrap();
        assert!(config.log_dir.is_dir());
    }

    #[test]
    fn test_rotation_from_toml() {
        let config: LogConfig = toml::from_str("rotation = \"hourly\"\nmax_log_files = 24").unwrap();
        assert_eq!(config.rotation, LogRotation::Hourly);
        assert_eq!(config.max_log_files, 24);
        assert_eq!(config.level, "info");
    }
}

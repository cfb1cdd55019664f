//! Tracing subscriber for the bridge process
//!
//! Console output goes to stderr so `list-ports` and `check-config` keep stdout
//! for their reports. File output rolls over on the configured schedule into
//! `flamebridge.<date>.log` and is written from a background thread, keeping
//! disk latency out of the frame loop.

use anyhow::{Context, Result};
use std::io::IsTerminal;

use flamebridge_core::logging::{LogConfig, LogRotation};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

const FILE_PREFIX: &str = "flamebridge";
const FILE_SUFFIX: &str = "log";

/// Flushes buffered file output when dropped; hold it until exit
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}

/// Configured level, unless RUST_LOG says otherwise
fn level_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(config.parse_level().into())
        .from_env_lossy()
}

/// Rolling appender in `log_dir` that prunes files beyond `max_log_files`
fn file_appender(config: &LogConfig) -> Result<RollingFileAppender> {
    config
        .ensure_log_directory()
        .with_context(|| format!("Failed to create log directory {:?}", config.log_dir))?;
    RollingFileAppender::builder()
        .rotation(rotation(config.rotation))
        .filename_prefix(FILE_PREFIX)
        .filename_suffix(FILE_SUFFIX)
        .max_log_files(config.max_log_files.max(1))
        .build(&config.log_dir)
        .with_context(|| format!("Failed to open log files in {:?}", config.log_dir))
}

/// Install the global subscriber
pub fn init(config: &LogConfig) -> Result<LogGuard> {
    let console = config.console_output.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(false)
            .with_timer(fmt::time::uptime())
            .with_filter(level_filter(config))
    });

    let (file, guard) = if config.file_output {
        let (writer, guard) = tracing_appender::non_blocking(file_appender(config)?);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(level_filter(config));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .init();

    if config.file_output {
        tracing::info!(
            "Logging to {:?} ({:?} rotation, keeping {})",
            config.log_dir,
            config.rotation,
            config.max_log_files
        );
    }
    Ok(LogGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_appender_names_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            file_output: true,
            log_dir: dir.path().join("logs"),
            rotation: LogRotation::Daily,
            ..LogConfig::default()
        };

        let mut appender = file_appender(&config).unwrap();
        appender.write_all(b"bridge started\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(&config.log_dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("flamebridge."), "{}", names[0]);
        assert!(names[0].ends_with(".log"), "{}", names[0]);
    }

    #[test]
    fn test_rotation_mapping() {
        assert_eq!(rotation(LogRotation::Hourly), Rotation::HOURLY);
        assert_eq!(rotation(LogRotation::Daily), Rotation::DAILY);
        assert_eq!(rotation(LogRotation::Never), Rotation::NEVER);
    }
}

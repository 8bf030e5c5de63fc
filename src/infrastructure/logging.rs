//! `tracing`/`tracing-subscriber` initialization: `EnvFilter` for level
//! control, JSON or pretty formatting per `LoggingConfig`, and optional
//! rolling file output via `tracing-appender`.

use anyhow::{bail, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use super::config::LoggingConfig;

/// Holds the non-blocking writer guard, if any; dropping it flushes
/// buffered log lines, so callers must keep it alive for the process
/// lifetime.
pub struct LoggerGuard {
    _file_guard: Option<WorkerGuard>,
}

pub fn init(config: &LoggingConfig) -> Result<LoggerGuard> {
    let level = parse_level(&config.level)?;
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true);

    let file_guard = if let Some(dir) = &config.log_dir {
        let appender = tracing_appender::rolling::daily(dir, "neoscan.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        if config.format == "json" {
            builder.json().with_writer(non_blocking).init();
        } else {
            builder.with_writer(non_blocking).init();
        }
        Some(guard)
    } else if config.format == "json" {
        builder.json().init();
        None
    } else {
        builder.init();
        None
    };

    Ok(LoggerGuard { _file_guard: file_guard })
}

fn parse_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => bail!("invalid log level: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels() {
        assert_eq!(parse_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_level("WARN").unwrap(), Level::WARN);
    }

    #[test]
    fn rejects_unknown_level() {
        assert!(parse_level("verbose").is_err());
    }
}

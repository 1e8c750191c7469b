//! Tracing subscriber setup.
//!
//! Human-readable lines go to stderr so stdout stays free for the staging
//! path. `RUST_LOG` overrides the default directive. An optional log file
//! is written through a non-blocking appender; keep the returned
//! [`LogGuard`] alive until exit so buffered lines are flushed.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events are shown at the configured level.
const OWN_TARGETS: [&str; 2] = ["sourcefetch", "sourcefetch_cli"];

/// Errors that can occur while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("failed to open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install log subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Keeps the file appender's worker alive.
#[must_use]
#[derive(Debug)]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    level: Level,
    log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_file: None,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Level from `-v` count and `--quiet`.
    ///
    /// `--quiet` wins over any number of `-v`.
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => Level::ERROR,
            (false, 0) => Level::INFO,
            (false, 1) => Level::DEBUG,
            (false, _) => Level::TRACE,
        };
        Self::default().with_level(level)
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Also write events to `path`.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Filter directive used when `RUST_LOG` is unset.
    pub fn directive(&self) -> String {
        let level = self.level.to_string().to_ascii_lowercase();
        let mut directive = String::from("warn");
        for target in OWN_TARGETS {
            directive.push_str(&format!(",{}={}", target, level));
        }
        directive
    }

    fn filter(&self) -> Result<EnvFilter, ParseError> {
        match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(env) if !env.trim().is_empty() => EnvFilter::try_new(env),
            _ => EnvFilter::try_new(self.directive()),
        }
    }
}

/// Install the global subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard, LoggingError> {
    let filter = config.filter()?;
    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(false);

    let (file_layer, file_guard) = match &config.log_file {
        Some(path) => {
            let open_err = |source| LoggingError::LogFile {
                path: path.clone(),
                source,
            };
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(open_err)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(open_err)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(LogGuard { _file: file_guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(
            LoggingConfig::new().directive(),
            "warn,sourcefetch=info,sourcefetch_cli=info"
        );
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LoggingConfig::from_verbosity(0, false).level(), Level::INFO);
        assert_eq!(LoggingConfig::from_verbosity(1, false).level(), Level::DEBUG);
        assert_eq!(LoggingConfig::from_verbosity(2, false).level(), Level::TRACE);
        assert_eq!(LoggingConfig::from_verbosity(5, false).level(), Level::TRACE);
        assert_eq!(LoggingConfig::from_verbosity(2, true).level(), Level::ERROR);
    }

    #[test]
    fn test_directive_parses() {
        for verbose in 0..3 {
            for quiet in [false, true] {
                let directive = LoggingConfig::from_verbosity(verbose, quiet).directive();
                assert!(EnvFilter::try_new(&directive).is_ok(), "{directive}");
            }
        }
    }

    #[test]
    fn test_quiet_directive() {
        assert_eq!(
            LoggingConfig::from_verbosity(0, true).directive(),
            "warn,sourcefetch=error,sourcefetch_cli=error"
        );
    }
}

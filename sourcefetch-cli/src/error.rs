//! CLI error type and exit codes.

use std::fmt;

use sourcefetch::config::ConfigFileError;
use sourcefetch::error::RunError;
use sourcefetch::fetch::FetchError;
use sourcefetch::logging::LoggingError;
use sourcefetch::request::ConfigError;

/// Exit code for a failed run.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code when the operator interrupted the run (128 + SIGINT).
pub const EXIT_INTERRUPTED: u8 = 130;

/// Errors surfaced by the CLI.
#[derive(Debug)]
pub enum CliError {
    /// Invalid settings or environment.
    Config(String),

    /// The configuration file could not be loaded.
    ConfigFile(ConfigFileError),

    /// Logging could not be initialized.
    Logging(LoggingError),

    /// The fetch run failed.
    Run(RunError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Run(RunError::Interrupted) => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "{}", e),
            CliError::Run(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(_) => None,
            CliError::ConfigFile(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Run(e) => Some(e),
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<RunError> for CliError {
    fn from(e: RunError) -> Self {
        CliError::Run(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Run(RunError::Config(e))
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        CliError::Run(RunError::Fetch(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Run(RunError::Interrupted).exit_code(), 130);
        assert_eq!(CliError::Config("bad".to_string()).exit_code(), 1);
        assert_eq!(
            CliError::from(ConfigError::MissingField("name")).exit_code(),
            1
        );
    }

    #[test]
    fn test_display() {
        let err = CliError::Config("missing handler".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing handler");

        let err = CliError::from(ConfigError::MissingField("name"));
        assert_eq!(
            err.to_string(),
            "invalid configuration: name must not be empty"
        );
    }
}

//! sourcefetch CLI
//!
//! Fetches a Flux source artifact through a temporary port-forward and
//! prints the directory it was extracted into. Logs go to stderr; stdout
//! carries only the staging path.

mod error;
mod fetch;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use sourcefetch::logging::{init_logging, LoggingConfig};
use tracing::debug;

use crate::error::CliError;
use crate::fetch::FetchArgs;

#[derive(Debug, Parser)]
#[command(name = "sourcefetch")]
#[command(version = sourcefetch::VERSION)]
#[command(about = "Fetch a Flux source artifact through a temporary port-forward")]
struct Cli {
    #[command(flatten)]
    fetch: FetchArgs,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn logging(&self) -> LoggingConfig {
        let config = LoggingConfig::from_verbosity(self.verbose, self.quiet);
        match &self.log_file {
            Some(path) => config.with_log_file(path),
            None => config,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_logging(&cli.logging()) {
        Ok(guard) => guard,
        Err(e) => return report(CliError::from(e)),
    };
    debug!(version = sourcefetch::VERSION, "Starting");

    match fetch::run(cli.fetch) {
        Ok(staging_dir) => {
            println!("{}", staging_dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => report(e),
    }
}

fn report(err: CliError) -> ExitCode {
    eprintln!("Error: {}", err);
    ExitCode::from(err.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use sourcefetch::request::SourceKind;
    use tracing::Level;

    #[test]
    fn test_name_is_required() {
        let err = Cli::try_parse_from(["sourcefetch"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_minimal_invocation() {
        let cli = Cli::try_parse_from(["sourcefetch", "--name", "demo"]).unwrap();

        assert_eq!(cli.fetch.name, "demo");
        assert_eq!(cli.fetch.source_type, None);
        assert_eq!(cli.fetch.local_port, None);
        assert_eq!(cli.logging().level(), Level::INFO);
    }

    #[test]
    fn test_source_type_parses() {
        let cli = Cli::try_parse_from([
            "sourcefetch",
            "--name",
            "podinfo",
            "--source-type",
            "helmchart",
        ])
        .unwrap();
        assert_eq!(cli.fetch.source_type, Some(SourceKind::HelmChart));
    }

    #[test]
    fn test_unknown_source_type_is_usage_error() {
        let err = Cli::try_parse_from([
            "sourcefetch",
            "--name",
            "demo",
            "--source-type",
            "bucket",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "sourcefetch",
            "--name",
            "demo",
            "--namespace",
            "apps",
            "--revision",
            "v1",
            "--local-port",
            "18080",
            "--service-name",
            "staging",
            "--service-namespace",
            "flux",
            "--service-port",
            "9090",
            "--context",
            "kind-dev",
            "--kubectl",
            "/opt/kubectl",
            "--ready-timeout",
            "30",
            "--timeout",
            "60",
            "--staging-dir",
            "/tmp/stage",
            "--chart-api-version",
            "v1",
            "--config",
            "/etc/sourcefetch.ini",
            "--log-file",
            "/tmp/sourcefetch.log",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.fetch.namespace.as_deref(), Some("apps"));
        assert_eq!(cli.fetch.revision.as_deref(), Some("v1"));
        assert_eq!(cli.fetch.local_port, Some(18080));
        assert_eq!(cli.fetch.service_name.as_deref(), Some("staging"));
        assert_eq!(cli.fetch.service_namespace.as_deref(), Some("flux"));
        assert_eq!(cli.fetch.service_port, Some(9090));
        assert_eq!(cli.fetch.context.as_deref(), Some("kind-dev"));
        assert_eq!(cli.fetch.kubectl.as_deref(), Some("/opt/kubectl"));
        assert_eq!(cli.fetch.ready_timeout, Some(30));
        assert_eq!(cli.fetch.timeout, Some(60));
        assert_eq!(cli.fetch.staging_dir, Some(PathBuf::from("/tmp/stage")));
        assert_eq!(cli.fetch.chart_api_version.as_deref(), Some("v1"));
        assert_eq!(cli.fetch.config, Some(PathBuf::from("/etc/sourcefetch.ini")));
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/sourcefetch.log")));
        assert_eq!(cli.logging().level(), Level::TRACE);
    }

    #[test]
    fn test_quiet_wins() {
        let cli = Cli::try_parse_from(["sourcefetch", "--name", "demo", "-v", "--quiet"]).unwrap();
        assert_eq!(cli.logging().level(), Level::ERROR);
    }

    #[test]
    fn test_port_must_fit_u16() {
        let err = Cli::try_parse_from(["sourcefetch", "--name", "demo", "--local-port", "70000"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_command_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

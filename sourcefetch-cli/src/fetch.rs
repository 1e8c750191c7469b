//! The fetch command: merge settings, wire interrupts, run.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use sourcefetch::config::{ConfigFile, FetchConfig};
use sourcefetch::orchestrator::Orchestrator;
use sourcefetch::request::{FetchRequest, SourceKind};
use sourcefetch::signal::InterruptRelay;
use tracing::{debug, info};

use crate::error::{CliError, EXIT_INTERRUPTED};

/// Arguments for a fetch.
///
/// Every optional value falls back to the config file, then to the
/// built-in default.
#[derive(Debug, Clone, Default, Args)]
pub struct FetchArgs {
    /// Source type: gitrepository or helmchart [default: gitrepository]
    #[arg(long = "source-type", value_name = "TYPE")]
    pub source_type: Option<SourceKind>,

    /// Name of the source object
    #[arg(long)]
    pub name: String,

    /// Namespace of the source object [default: flux-system]
    #[arg(long)]
    pub namespace: Option<String>,

    /// Revision to fetch, used verbatim as a path segment [default: latest]
    #[arg(long)]
    pub revision: Option<String>,

    /// Local port for the port-forward [default: 8080]
    #[arg(long, value_name = "PORT")]
    pub local_port: Option<u16>,

    /// Name of the staging service [default: source-controller]
    #[arg(long, value_name = "NAME")]
    pub service_name: Option<String>,

    /// Namespace of the staging service [default: flux-system]
    #[arg(long, value_name = "NAMESPACE")]
    pub service_namespace: Option<String>,

    /// Port of the staging service [default: 80]
    #[arg(long, value_name = "PORT")]
    pub service_port: Option<u16>,

    /// Kubeconfig context for port-forward and HelmChart lookup
    #[arg(long)]
    pub context: Option<String>,

    /// Port-forward program [default: kubectl]
    #[arg(long, value_name = "PATH")]
    pub kubectl: Option<String>,

    /// Seconds to wait for the port-forward to accept connections [default: 10]
    #[arg(long, value_name = "SECS")]
    pub ready_timeout: Option<u64>,

    /// HTTP timeout in seconds for the download [default: 15]
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory in which the staging directory is created [default: system temp dir]
    #[arg(long, value_name = "DIR")]
    pub staging_dir: Option<PathBuf>,

    /// API version of the HelmChart resource [default: v1beta1]
    #[arg(long, value_name = "VERSION")]
    pub chart_api_version: Option<String>,

    /// Config file [default: <config dir>/sourcefetch/config.ini]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Run a fetch and return the staging directory.
pub fn run(args: FetchArgs) -> Result<PathBuf, CliError> {
    let file = match &args.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    let (request, config) = resolve(&args, &file)?;
    debug!(?config, "Resolved settings");

    let relay = InterruptRelay::new();
    let handler_relay = relay.clone();
    ctrlc::set_handler(move || {
        // No run in flight, so no tunnel to tear down.
        if !handler_relay.trigger() {
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let orchestrator = Orchestrator::from_config(&config)?.with_interrupt_relay(relay);

    info!(
        kind = %request.kind(),
        namespace = request.namespace(),
        name = request.name(),
        revision = request.revision(),
        tunnel = %request.tunnel(),
        "Fetching source artifact"
    );
    let outcome = orchestrator.run(&request)?;
    Ok(outcome.staging_dir)
}

/// Merge command-line arguments over the config file.
fn resolve(
    args: &FetchArgs,
    file: &ConfigFile,
) -> Result<(FetchRequest, FetchConfig), CliError> {
    let kind = match (args.source_type, &file.source.kind) {
        (Some(kind), _) => kind,
        (None, Some(kind)) => kind.parse()?,
        (None, None) => SourceKind::GitRepository,
    };

    let mut builder = FetchRequest::builder(kind, args.name.clone());
    if let Some(namespace) = pick(&args.namespace, &file.source.namespace) {
        builder = builder.namespace(namespace);
    }
    if let Some(revision) = pick(&args.revision, &file.source.revision) {
        builder = builder.revision(revision);
    }
    if let Some(port) = args.local_port.or(file.tunnel.local_port) {
        builder = builder.local_port(port);
    }
    if let Some(port) = args.service_port.or(file.service.port) {
        builder = builder.service_port(port);
    }
    if let Some(namespace) = pick(&args.service_namespace, &file.service.namespace) {
        builder = builder.service_namespace(namespace);
    }
    if let Some(name) = pick(&args.service_name, &file.service.name) {
        builder = builder.service_name(name);
    }
    let request = builder.build()?;

    let mut config = FetchConfig::from_file(file);
    if let Some(program) = &args.kubectl {
        config = config.with_program(program);
    }
    if let Some(context) = &args.context {
        config = config.with_context(context);
    }
    if let Some(secs) = args.ready_timeout {
        config = config.with_ready_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = args.timeout {
        config = config.with_http_timeout(Duration::from_secs(secs));
    }
    if let Some(dir) = &args.staging_dir {
        config = config.with_staging_root(dir);
    }
    if let Some(version) = &args.chart_api_version {
        config = config.with_chart_api_version(version);
    }

    Ok((request, config))
}

/// Command-line value, else config file value.
fn pick(cli: &Option<String>, file: &Option<String>) -> Option<String> {
    cli.clone().or_else(|| file.clone())
}

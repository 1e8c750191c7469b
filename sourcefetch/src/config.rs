//! Runtime settings and the optional INI configuration file.
//!
//! [`FetchConfig`] carries everything a run needs besides the
//! [`FetchRequest`](crate::request::FetchRequest) itself: which program to
//! port-forward with, how long to wait for readiness and downloads, and
//! where staging directories go. [`ConfigFile`] is the on-disk form; values
//! given on the command line take precedence over it, and it takes
//! precedence over the built-in defaults.
//!
//! ```ini
//! [source]
//! type = gitrepository
//! namespace = flux-system
//! revision = latest
//!
//! [service]
//! name = source-controller
//! namespace = flux-system
//! port = 80
//!
//! [cluster]
//! context = kind-dev
//!
//! [tunnel]
//! local_port = 8080
//! program = kubectl
//! ready_timeout_secs = 10
//! stop_grace_secs = 5
//!
//! [fetch]
//! timeout_secs = 15
//! staging_dir = /var/tmp/sourcefetch
//!
//! [chart]
//! api_version = v1beta1
//! ```

use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;
use tracing::debug;

use crate::fetch::{FetchResult, HttpFetcher, DEFAULT_TIMEOUT};
use crate::source::{KubeStatusResolver, DEFAULT_HELM_CHART_VERSION};
use crate::tunnel::{KubectlPortForward, ReadinessProbe, DEFAULT_PROGRAM, DEFAULT_STOP_GRACE};

/// Application directory name under the user's config directory.
const CONFIG_DIR: &str = "sourcefetch";

/// Configuration file name.
const CONFIG_FILE: &str = "config.ini";

/// Path of the default configuration file.
///
/// `<config dir>/sourcefetch/config.ini`, falling back to the current
/// directory when the platform has no config directory.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Runtime settings for a fetch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    program: String,
    context: Option<String>,
    probe: ReadinessProbe,
    stop_grace: Duration,
    http_timeout: Duration,
    staging_root: PathBuf,
    chart_api_version: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            context: None,
            probe: ReadinessProbe::default(),
            stop_grace: DEFAULT_STOP_GRACE,
            http_timeout: DEFAULT_TIMEOUT,
            staging_root: std::env::temp_dir(),
            chart_api_version: DEFAULT_HELM_CHART_VERSION.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with whatever `file` sets.
    pub fn from_file(file: &ConfigFile) -> Self {
        let mut config = Self::default();
        if let Some(program) = &file.tunnel.program {
            config.program = program.clone();
        }
        if let Some(context) = &file.cluster.context {
            config.context = Some(context.clone());
        }
        if let Some(secs) = file.tunnel.ready_timeout_secs {
            config.probe.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.tunnel.stop_grace_secs {
            config.stop_grace = Duration::from_secs(secs);
        }
        if let Some(secs) = file.fetch.timeout_secs {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = &file.fetch.staging_dir {
            config.staging_root = dir.clone();
        }
        if let Some(version) = &file.chart.api_version {
            config.chart_api_version = version.clone();
        }
        config
    }

    /// Port-forward program, `kubectl` by default.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Kubeconfig context used by both the port-forward and the resolver.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.probe.timeout = timeout;
        self
    }

    pub fn with_ready_interval(mut self, interval: Duration) -> Self {
        self.probe.interval = interval;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = root.into();
        self
    }

    pub fn with_chart_api_version(mut self, version: impl Into<String>) -> Self {
        self.chart_api_version = version.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn readiness_probe(&self) -> ReadinessProbe {
        self.probe
    }

    pub fn stop_grace(&self) -> Duration {
        self.stop_grace
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    pub fn chart_api_version(&self) -> &str {
        &self.chart_api_version
    }

    /// Tunnel supervisor for these settings.
    pub fn port_forward(&self) -> KubectlPortForward {
        let supervisor = KubectlPortForward::new()
            .with_program(&self.program)
            .with_stop_grace(self.stop_grace);
        match &self.context {
            Some(context) => supervisor.with_args(["--context", context.as_str()]),
            None => supervisor,
        }
    }

    /// Control-plane resolver for these settings.
    pub fn status_resolver(&self) -> KubeStatusResolver {
        let resolver = KubeStatusResolver::new(&self.chart_api_version);
        match &self.context {
            Some(context) => resolver.with_context(context),
            None => resolver,
        }
    }

    /// HTTP fetcher for these settings.
    pub fn http_fetcher(&self) -> FetchResult<HttpFetcher> {
        HttpFetcher::with_timeout(self.http_timeout)
    }
}

/// Errors reading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: ini::ParseError,
    },

    #[error("invalid value {value:?} for [{section}] {key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// `[source]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSection {
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub revision: Option<String>,
}

/// `[service]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSection {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub port: Option<u16>,
}

/// `[cluster]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSection {
    pub context: Option<String>,
}

/// `[tunnel]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunnelSection {
    pub local_port: Option<u16>,
    pub program: Option<String>,
    pub ready_timeout_secs: Option<u64>,
    pub stop_grace_secs: Option<u64>,
}

/// `[fetch]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSection {
    pub timeout_secs: Option<u64>,
    pub staging_dir: Option<PathBuf>,
}

/// `[chart]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartSection {
    pub api_version: Option<String>,
}

/// Parsed configuration file. Every value is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub source: SourceSection,
    pub service: ServiceSection,
    pub cluster: ClusterSection,
    pub tunnel: TunnelSection,
    pub fetch: FetchSection,
    pub chart: ChartSection,
}

impl ConfigFile {
    /// Load the default file; a missing file yields an empty config.
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load an explicitly named file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        let contents = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ConfigFileError::NotFound(path.to_path_buf())
            } else {
                ConfigFileError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let ini = Ini::load_from_str(&contents).map_err(|source| ConfigFileError::Syntax {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigFileError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("source")) {
            config.source.kind = string(section, "type");
            config.source.namespace = string(section, "namespace");
            config.source.revision = string(section, "revision");
        }

        if let Some(section) = ini.section(Some("service")) {
            config.service.name = string(section, "name");
            config.service.namespace = string(section, "namespace");
            config.service.port = number(section, "service", "port")?;
        }

        if let Some(section) = ini.section(Some("cluster")) {
            config.cluster.context = string(section, "context");
        }

        if let Some(section) = ini.section(Some("tunnel")) {
            config.tunnel.local_port = number(section, "tunnel", "local_port")?;
            config.tunnel.program = string(section, "program");
            config.tunnel.ready_timeout_secs = number(section, "tunnel", "ready_timeout_secs")?;
            config.tunnel.stop_grace_secs = number(section, "tunnel", "stop_grace_secs")?;
        }

        if let Some(section) = ini.section(Some("fetch")) {
            config.fetch.timeout_secs = number(section, "fetch", "timeout_secs")?;
            config.fetch.staging_dir = string(section, "staging_dir").map(PathBuf::from);
        }

        if let Some(section) = ini.section(Some("chart")) {
            config.chart.api_version = string(section, "api_version");
        }

        Ok(config)
    }
}

impl FromStr for ConfigFile {
    type Err = ConfigFileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ini = Ini::load_from_str(s).map_err(|source| ConfigFileError::Syntax {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Self::from_ini(&ini)
    }
}

/// Non-empty string value of `key`.
fn string(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn number<T>(
    section: &Properties,
    section_name: &'static str,
    key: &'static str,
) -> Result<Option<T>, ConfigFileError>
where
    T: FromStr,
    T::Err: Display,
{
    match string(section, key) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigFileError::InvalidValue {
                section: section_name,
                key,
                reason: e.to_string(),
                value,
            }),
    }
}

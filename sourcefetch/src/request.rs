//! Fetch request model and its validation boundary.
//!
//! A [`FetchRequest`] is immutable once built and fully determines a run:
//! which source artifact to fetch and which in-cluster service to tunnel to.
//! All identifier and kind validation happens in [`FetchRequestBuilder::build`],
//! before any process is spawned or directory created.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::tunnel::TunnelTarget;

/// Default namespace for both the source object and the staging service.
pub const DEFAULT_NAMESPACE: &str = "flux-system";

/// Default revision path segment.
pub const DEFAULT_REVISION: &str = "latest";

/// Default name of the staging service.
pub const DEFAULT_SERVICE_NAME: &str = "source-controller";

/// Default port of the staging service.
pub const DEFAULT_SERVICE_PORT: u16 = 80;

/// Default local end of the port-forward.
pub const DEFAULT_LOCAL_PORT: u16 = 8080;

/// Result type for request validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors, detected before any side effect.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The source kind is not one of the supported kinds.
    #[error("source type {kind:?} not allowed, must be one of: {allowed}")]
    UnknownKind { kind: String, allowed: String },

    /// A required identifier was empty.
    #[error("{0} must not be empty")]
    MissingField(&'static str),

    /// A port was zero.
    #[error("{0} must be a non-zero port")]
    InvalidPort(&'static str),
}

/// Category of staged artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Git repository snapshot; its URL is computable locally.
    GitRepository,
    /// Packaged Helm chart; its URL is published in the object's status.
    HelmChart,
}

impl SourceKind {
    /// Every supported kind, in display order.
    pub const ALL: [SourceKind; 2] = [SourceKind::GitRepository, SourceKind::HelmChart];

    /// Lowercase identifier, also used as the first URL path segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::GitRepository => "gitrepository",
            SourceKind::HelmChart => "helmchart",
        }
    }

    /// Comma-separated list of allowed identifiers.
    pub fn allowed() -> String {
        Self::ALL
            .iter()
            .map(SourceKind::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownKind {
                kind: s.to_string(),
                allowed: Self::allowed(),
            })
    }
}

/// A validated, immutable description of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    kind: SourceKind,
    namespace: String,
    name: String,
    revision: String,
    tunnel: TunnelTarget,
}

impl FetchRequest {
    /// Start building a request for the named source object.
    pub fn builder(kind: SourceKind, name: impl Into<String>) -> FetchRequestBuilder {
        FetchRequestBuilder::new(kind, name)
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opaque revision identifier, passed through verbatim.
    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// Where the port-forward should point.
    pub fn tunnel(&self) -> &TunnelTarget {
        &self.tunnel
    }

    pub fn local_port(&self) -> u16 {
        self.tunnel.local_port
    }
}

/// Builder for [`FetchRequest`].
#[derive(Debug, Clone)]
pub struct FetchRequestBuilder {
    kind: SourceKind,
    namespace: String,
    name: String,
    revision: String,
    tunnel: TunnelTarget,
}

impl FetchRequestBuilder {
    fn new(kind: SourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: DEFAULT_NAMESPACE.to_string(),
            name: name.into(),
            revision: DEFAULT_REVISION.to_string(),
            tunnel: TunnelTarget {
                service_namespace: DEFAULT_NAMESPACE.to_string(),
                service_name: DEFAULT_SERVICE_NAME.to_string(),
                local_port: DEFAULT_LOCAL_PORT,
                service_port: DEFAULT_SERVICE_PORT,
            },
        }
    }

    /// Set the namespace of the source object.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the revision path segment.
    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Set the namespace and name of the staging service.
    pub fn service(mut self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        self.tunnel.service_namespace = namespace.into();
        self.tunnel.service_name = name.into();
        self
    }

    /// Set the namespace of the staging service.
    pub fn service_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.tunnel.service_namespace = namespace.into();
        self
    }

    /// Set the name of the staging service.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.tunnel.service_name = name.into();
        self
    }

    /// Set the port the staging service listens on.
    pub fn service_port(mut self, port: u16) -> Self {
        self.tunnel.service_port = port;
        self
    }

    /// Set the local end of the port-forward.
    pub fn local_port(mut self, port: u16) -> Self {
        self.tunnel.local_port = port;
        self
    }

    /// Validate and freeze the request.
    pub fn build(self) -> ConfigResult<FetchRequest> {
        require_non_empty("name", &self.name)?;
        require_non_empty("namespace", &self.namespace)?;
        require_non_empty("revision", &self.revision)?;
        require_non_empty("service name", &self.tunnel.service_name)?;
        require_non_empty("service namespace", &self.tunnel.service_namespace)?;
        if self.tunnel.local_port == 0 {
            return Err(ConfigError::InvalidPort("local port"));
        }
        if self.tunnel.service_port == 0 {
            return Err(ConfigError::InvalidPort("service port"));
        }

        Ok(FetchRequest {
            kind: self.kind,
            namespace: self.namespace,
            name: self.name,
            revision: self.revision,
            tunnel: self.tunnel,
        })
    }
}

fn require_non_empty(field: &'static str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        Err(ConfigError::MissingField(field))
    } else {
        Ok(())
    }
}

//! Run-level error taxonomy.

use thiserror::Error;

use crate::fetch::FetchError;
use crate::request::ConfigError;
use crate::source::ResolveError;
use crate::staging::StagingError;
use crate::tunnel::TunnelError;

/// Result type for a whole fetch run.
pub type RunResult<T> = Result<T, RunError>;

/// Why a fetch run failed.
///
/// Every variant after `TunnelStart` is returned only after the tunnel has
/// been torn down.
#[derive(Debug, Error)]
pub enum RunError {
    /// Invalid request; nothing was started.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The port-forward could not be launched.
    #[error("failed to start port forwarding: {0}")]
    TunnelStart(#[source] TunnelError),

    /// The port-forward started but never accepted connections.
    #[error("port forwarding not ready: {0}")]
    TunnelNotReady(#[source] TunnelError),

    /// The staging directory could not be created.
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// The artifact URL could not be determined.
    #[error("failed to resolve artifact URL: {0}")]
    Resolve(#[from] ResolveError),

    /// Download or extraction failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The port-forward could not be shut down cleanly.
    #[error("failed to stop port forwarding: {0}")]
    Teardown(#[source] TunnelError),

    /// The operator interrupted the run.
    #[error("interrupted")]
    Interrupted,
}

impl RunError {
    /// Whether this failure happened after the tunnel was up.
    pub fn tunnel_was_started(&self) -> bool {
        !matches!(self, RunError::Config(_) | RunError::TunnelStart(_))
    }
}

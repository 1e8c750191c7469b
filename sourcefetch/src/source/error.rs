//! Error types for artifact URL resolution.

use std::io;

use thiserror::Error;

/// Result type for URL resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors that can occur while resolving an artifact URL.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The async runtime used for the control-plane call could not be built.
    #[error("failed to create runtime for cluster access: {0}")]
    Runtime(#[source] io::Error),

    /// The kubeconfig or the requested context could not be loaded.
    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(#[source] kube::config::KubeconfigError),

    /// No usable cluster configuration or client.
    #[error("failed to connect to the cluster: {0}")]
    Client(#[source] kube::Error),

    /// Reading the custom resource failed (including not found).
    #[error("failed to get {kind} {namespace}/{name}: {source}")]
    Get {
        kind: String,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    /// `.status.url` is absent.
    #[error(".status.url not set on {namespace}/{name}")]
    StatusUrlMissing { namespace: String, name: String },

    /// `.status.url` is present but not a string, or `.status` is not an object.
    #[error(".status.url on {namespace}/{name} is not a string (found {found})")]
    StatusUrlNotString {
        namespace: String,
        name: String,
        found: &'static str,
    },

    /// The published URL could not be parsed.
    #[error("invalid published URL {url:?}: {reason}")]
    MalformedStatusUrl { url: String, reason: String },

    /// The published URL path has too few segments to carry an artifact.
    #[error("published URL {url:?} has {segments} path segments, expected at least {expected}")]
    StatusUrlTooShort {
        url: String,
        segments: usize,
        expected: usize,
    },
}

//! Artifact URL resolution.
//!
//! Repository snapshots have a URL computable from the request alone.
//! Packaged charts only get a location once the staging service has built
//! them, so it is read from the HelmChart's `.status.url` and rewritten to
//! point at the tunnel.

mod cluster;
mod error;
mod url;

pub use self::cluster::{
    KubeStatusResolver, DEFAULT_HELM_CHART_VERSION, HELM_CHART_KIND, SOURCE_GROUP,
};
pub use self::error::{ResolveError, ResolveResult};
pub use self::url::{ArtifactUrl, ARCHIVE_SUFFIX};

use crate::request::{FetchRequest, SourceKind};

/// Looks up the published (cluster-internal) URL of a source object.
pub trait StatusUrlResolver {
    fn status_url(&self, namespace: &str, name: &str) -> ResolveResult<String>;
}

impl<T: StatusUrlResolver + ?Sized> StatusUrlResolver for &T {
    fn status_url(&self, namespace: &str, name: &str) -> ResolveResult<String> {
        (**self).status_url(namespace, name)
    }
}

/// Produce the tunnel-local artifact URL for `request`.
///
/// `local_port` is the port of the active tunnel. `resolver` is only
/// consulted for [`SourceKind::HelmChart`].
pub fn resolve_artifact_url<R>(
    request: &FetchRequest,
    local_port: u16,
    resolver: &R,
) -> ResolveResult<ArtifactUrl>
where
    R: StatusUrlResolver + ?Sized,
{
    match request.kind() {
        SourceKind::GitRepository => Ok(ArtifactUrl::for_source(
            request.kind(),
            request.namespace(),
            request.name(),
            request.revision(),
            local_port,
        )),
        SourceKind::HelmChart => {
            let published = resolver.status_url(request.namespace(), request.name())?;
            ArtifactUrl::from_status_url(&published, local_port)
        }
    }
}

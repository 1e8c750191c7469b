//! Artifact URLs addressed at the local end of the tunnel.

use std::fmt;

use reqwest::Url;

use super::error::{ResolveError, ResolveResult};
use crate::request::SourceKind;

/// Archive suffix of computed repository artifact URLs.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Minimum number of path segments in a published status URL.
const MIN_STATUS_PATH_SEGMENTS: usize = 4;

/// An artifact URL whose host is always `localhost:<local port>`.
///
/// Only reachable through an active tunnel; there is no way to build one
/// pointing anywhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactUrl(String);

impl ArtifactUrl {
    /// `http://localhost:<port>/<path>`.
    pub fn local(local_port: u16, path: &str) -> Self {
        Self(format!(
            "http://localhost:{}/{}",
            local_port,
            path.trim_start_matches('/')
        ))
    }

    /// Computed URL: `/<kind>/<namespace>/<name>/<revision>.tar.gz`.
    pub fn for_source(
        kind: SourceKind,
        namespace: &str,
        name: &str,
        revision: &str,
        local_port: u16,
    ) -> Self {
        Self::local(
            local_port,
            &format!("{kind}/{namespace}/{name}/{revision}{ARCHIVE_SUFFIX}"),
        )
    }

    /// Rewrite a cluster-internal published URL to go through the tunnel.
    ///
    /// The scheme, host and port are replaced, the leading path segment is
    /// dropped and the remaining segments are kept verbatim. Query and
    /// fragment are discarded.
    pub fn from_status_url(status_url: &str, local_port: u16) -> ResolveResult<Self> {
        let parsed = Url::parse(status_url).map_err(|e| ResolveError::MalformedStatusUrl {
            url: status_url.to_string(),
            reason: e.to_string(),
        })?;

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        if segments.len() < MIN_STATUS_PATH_SEGMENTS {
            return Err(ResolveError::StatusUrlTooShort {
                url: status_url.to_string(),
                segments: segments.len(),
                expected: MIN_STATUS_PATH_SEGMENTS,
            });
        }

        Ok(Self::local(local_port, &segments[1..].join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

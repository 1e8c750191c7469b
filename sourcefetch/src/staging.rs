//! Per-run staging directories.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::request::FetchRequest;

/// Result type for staging operations.
pub type StagingResult<T> = Result<T, StagingError>;

/// Errors creating a staging directory.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("failed to create staging directory under {}: {source}", root.display())]
    Create {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A uniquely named directory the artifact is extracted into.
///
/// The directory is kept on disk after the run, whether it succeeded or
/// not; its path is the primary output of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingDirectory {
    path: PathBuf,
}

impl StagingDirectory {
    /// Create a fresh directory under `root` named after the request.
    ///
    /// `root` is created if missing.
    pub fn create(root: &Path, request: &FetchRequest) -> StagingResult<Self> {
        let create_err = |source| StagingError::Create {
            root: root.to_path_buf(),
            source,
        };

        fs::create_dir_all(root).map_err(create_err)?;
        let path = tempfile::Builder::new()
            .prefix(&Self::prefix(request))
            .tempdir_in(root)
            .map_err(create_err)?
            .keep();

        debug!(path = %path.display(), "Created staging directory");
        Ok(Self { path })
    }

    /// Directory name prefix: `<namespace>-<name>-<revision>-`.
    ///
    /// Path separators in the revision are replaced with `_`.
    pub fn prefix(request: &FetchRequest) -> String {
        format!(
            "{}-{}-{}-",
            request.namespace(),
            request.name(),
            sanitize(request.revision())
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

impl AsRef<Path> for StagingDirectory {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

fn sanitize(segment: &str) -> String {
    segment.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SourceKind;
    use tempfile::TempDir;

    fn request(revision: &str) -> FetchRequest {
        FetchRequest::builder(SourceKind::GitRepository, "demo")
            .revision(revision)
            .build()
            .unwrap()
    }

    #[test]
    fn test_prefix_embeds_identity() {
        assert_eq!(
            StagingDirectory::prefix(&request("v1")),
            "flux-system-demo-v1-"
        );
    }

    #[test]
    fn test_prefix_sanitizes_revision() {
        assert_eq!(
            StagingDirectory::prefix(&request("main/abc123")),
            "flux-system-demo-main_abc123-"
        );
    }

    #[test]
    fn test_create_is_unique_and_persistent() {
        let temp = TempDir::new().unwrap();
        let req = request("v1");

        let first = StagingDirectory::create(temp.path(), &req).unwrap();
        let second = StagingDirectory::create(temp.path(), &req).unwrap();

        assert_ne!(first, second);
        assert!(first.path().is_dir());
        assert!(second.path().is_dir());
        assert!(first.path().starts_with(temp.path()));
        let name = first.path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("flux-system-demo-v1-"), "{name}");
    }

    #[test]
    fn test_create_makes_missing_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("nested").join("root");

        let dir = StagingDirectory::create(&root, &request("v1")).unwrap();
        assert!(dir.path().starts_with(&root));
    }

    #[test]
    fn test_create_fails_when_root_is_a_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();

        let err = StagingDirectory::create(&file, &request("v1")).unwrap_err();
        assert!(matches!(err, StagingError::Create { .. }));
    }
}

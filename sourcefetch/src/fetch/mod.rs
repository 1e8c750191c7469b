//! Artifact download and extraction.
//!
//! An [`ArtifactFetcher`] takes a tunnel-local [`ArtifactUrl`] and
//! materializes the archive behind it into a target directory.

mod error;
mod extract;
mod http;

pub use self::error::{FetchError, FetchResult};
pub use self::extract::{ArchiveExtractor, ExtractError, ExtractResult, TarGzExtractor};
pub use self::http::{HttpFetcher, DEFAULT_TIMEOUT};

use std::path::Path;

use crate::source::ArtifactUrl;

/// What a successful fetch produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Size of the downloaded archive.
    pub bytes: u64,
    /// Number of archive entries written.
    pub entries: usize,
}

/// Downloads an artifact and unpacks it.
pub trait ArtifactFetcher {
    fn fetch(&self, url: &ArtifactUrl, target_dir: &Path) -> FetchResult<FetchSummary>;
}

impl<T: ArtifactFetcher + ?Sized> ArtifactFetcher for &T {
    fn fetch(&self, url: &ArtifactUrl, target_dir: &Path) -> FetchResult<FetchSummary> {
        (**self).fetch(url, target_dir)
    }
}

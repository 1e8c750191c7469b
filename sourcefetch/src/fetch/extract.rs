//! Archive extraction for downloaded artifacts.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;

/// Result type for extraction.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors that can occur while unpacking an archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The target directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The stream is not a valid gzip-compressed tar archive.
    #[error("malformed archive: {0}")]
    Malformed(#[source] io::Error),

    /// Writing an entry to disk failed.
    #[error("failed to unpack {}: {source}", entry.display())]
    Unpack {
        entry: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An entry would be written outside the target directory.
    #[error("refusing to unpack {} outside the target directory", entry.display())]
    PathTraversal { entry: PathBuf },
}

/// Materializes an archive stream into a directory.
pub trait ArchiveExtractor {
    /// Unpack `archive` under `dest_dir`, returning the number of entries written.
    fn extract(&self, archive: &mut dyn Read, dest_dir: &Path) -> ExtractResult<usize>;
}

/// Extractor for gzip-compressed tar streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarGzExtractor;

impl TarGzExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveExtractor for TarGzExtractor {
    fn extract(&self, archive: &mut dyn Read, dest_dir: &Path) -> ExtractResult<usize> {
        fs::create_dir_all(dest_dir).map_err(|source| ExtractError::CreateDir {
            path: dest_dir.to_path_buf(),
            source,
        })?;

        let mut archive = tar::Archive::new(GzDecoder::new(archive));
        let mut count = 0;

        for entry in archive.entries().map_err(ExtractError::Malformed)? {
            let mut entry = entry.map_err(ExtractError::Malformed)?;
            let path = entry
                .path()
                .map_err(ExtractError::Malformed)?
                .into_owned();

            // `unpack_in` returns false for entries that would escape `dest_dir`.
            let unpacked = entry
                .unpack_in(dest_dir)
                .map_err(|source| ExtractError::Unpack {
                    entry: path.clone(),
                    source,
                })?;
            if !unpacked {
                return Err(ExtractError::PathTraversal { entry: path });
            }
            count += 1;
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    /// Archive with a raw entry name, bypassing the builder's path checks.
    fn tar_gz_raw_name(name: &str, data: &[u8]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_old();
        header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, data).unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_round_trip_reproduces_entries() {
        let temp = TempDir::new().unwrap();
        let entries: &[(&str, &[u8])] = &[
            ("README.md", b"# demo\n"),
            ("deploy/app.yaml", b"kind: Deployment\n"),
            ("deploy/nested/values.yaml", b"replicas: 2\n"),
        ];
        let archive = tar_gz(entries);

        let count = TarGzExtractor::new()
            .extract(&mut archive.as_slice(), temp.path())
            .unwrap();

        assert_eq!(count, entries.len());
        for (path, data) in entries {
            assert_eq!(fs::read(temp.path().join(path)).unwrap(), *data);
        }
    }

    #[test]
    fn test_creates_missing_target() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("a").join("b");
        let archive = tar_gz(&[("file.txt", b"x")]);

        TarGzExtractor::new()
            .extract(&mut archive.as_slice(), &dest)
            .unwrap();

        assert!(dest.join("file.txt").is_file());
    }

    #[test]
    fn test_rejects_path_traversal() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("staging");
        let archive = tar_gz_raw_name("../evil.txt", b"pwned");

        let err = TarGzExtractor::new()
            .extract(&mut archive.as_slice(), &dest)
            .unwrap_err();

        assert!(matches!(err, ExtractError::PathTraversal { .. }));
        assert!(!temp.path().join("evil.txt").exists());
    }

    #[test]
    fn test_rejects_non_gzip() {
        let temp = TempDir::new().unwrap();
        let err = TarGzExtractor::new()
            .extract(&mut &b"<html>not found</html>"[..], temp.path())
            .unwrap_err();

        assert!(matches!(err, ExtractError::Malformed(_)));
    }

    #[test]
    fn test_empty_archive() {
        let temp = TempDir::new().unwrap();
        let archive = tar_gz(&[]);

        let count = TarGzExtractor::new()
            .extract(&mut archive.as_slice(), temp.path())
            .unwrap();
        assert_eq!(count, 0);
    }
}

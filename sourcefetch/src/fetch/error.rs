//! Error types for the artifact fetcher.

use std::path::PathBuf;
use std::time::Duration;

use super::extract::ExtractError;

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors that can occur while downloading and unpacking an artifact.
#[derive(Debug)]
pub enum FetchError {
    /// The HTTP client could not be constructed.
    Client(reqwest::Error),

    /// The request did not complete within the client timeout.
    Timeout { url: String, timeout: Duration },

    /// DNS, connect or other transport failure.
    Transport { url: String, source: reqwest::Error },

    /// The server answered with something other than the expected status.
    UnexpectedStatus {
        url: String,
        expected: u16,
        actual: u16,
    },

    /// Reading the response body failed.
    Body { url: String, source: reqwest::Error },

    /// The downloaded archive could not be unpacked.
    Extraction {
        path: PathBuf,
        source: ExtractError,
    },
}

impl FetchError {
    /// Status code returned by the server, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { actual, .. } => Some(*actual),
            _ => None,
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client(e) => write!(f, "failed to create HTTP client: {}", e),
            Self::Timeout { url, timeout } => {
                write!(f, "request to {:?} timed out after {:?}", url, timeout)
            }
            Self::Transport { url, source } => {
                write!(f, "error calling {:?}: {}", url, source)
            }
            Self::UnexpectedStatus {
                url,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "error calling {:?}: expected {}, got {}",
                    url, expected, actual
                )
            }
            Self::Body { url, source } => {
                write!(f, "failed to read response from {:?}: {}", url, source)
            }
            Self::Extraction { path, source } => {
                write!(f, "failed to untar into {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Client(e) => Some(e),
            Self::Transport { source, .. } => Some(source),
            Self::Body { source, .. } => Some(source),
            Self::Extraction { source, .. } => Some(source),
            Self::Timeout { .. } | Self::UnexpectedStatus { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_status_display() {
        let err = FetchError::UnexpectedStatus {
            url: "http://localhost:8080/gitrepository/flux-system/demo/v1.tar.gz".to_string(),
            expected: 200,
            actual: 404,
        };
        assert_eq!(
            err.to_string(),
            "error calling \"http://localhost:8080/gitrepository/flux-system/demo/v1.tar.gz\": expected 200, got 404"
        );
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_timeout_display() {
        let err = FetchError::Timeout {
            url: "http://localhost:8080/x.tar.gz".to_string(),
            timeout: Duration::from_secs(15),
        };
        assert!(err.to_string().contains("timed out after 15s"));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_extraction_source() {
        use std::error::Error;

        let err = FetchError::Extraction {
            path: PathBuf::from("/tmp/staging"),
            source: ExtractError::PathTraversal {
                entry: PathBuf::from("../evil"),
            },
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/tmp/staging"));
    }
}

//! Blocking HTTP fetcher.

use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, info};

use super::error::{FetchError, FetchResult};
use super::extract::{ArchiveExtractor, TarGzExtractor};
use super::{ArtifactFetcher, FetchSummary};
use crate::source::ArtifactUrl;

/// Default overall timeout for an artifact request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// The only status accepted as a successful download.
const EXPECTED_STATUS: StatusCode = StatusCode::OK;

/// Downloads an artifact with a single GET and hands the body to an extractor.
///
/// There is no retry: one request is made per fetch, bounded by the
/// configured timeout.
#[derive(Debug)]
pub struct HttpFetcher<E = TarGzExtractor> {
    client: Client,
    timeout: Duration,
    extractor: E,
}

impl HttpFetcher {
    /// Fetcher with the default timeout and a gzip tar extractor.
    pub fn new() -> FetchResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> FetchResult<Self> {
        Self::with_extractor(timeout, TarGzExtractor::new())
    }
}

impl<E: ArchiveExtractor> HttpFetcher<E> {
    /// Fetcher with a custom timeout and extractor.
    pub fn with_extractor(timeout: Duration, extractor: E) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            timeout,
            extractor,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url` and return the full body.
    ///
    /// Anything but `200 OK` is an error; the body of a failed response is
    /// never returned.
    pub fn download(&self, url: &ArtifactUrl) -> FetchResult<Vec<u8>> {
        debug!(url = %url, timeout_ms = self.timeout.as_millis() as u64, "GET artifact");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .map_err(|e| self.request_error(url, e, false))?;

        let status = response.status();
        if status != EXPECTED_STATUS {
            return Err(FetchError::UnexpectedStatus {
                url: url.to_string(),
                expected: EXPECTED_STATUS.as_u16(),
                actual: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .map_err(|e| self.request_error(url, e, true))?;
        Ok(body.to_vec())
    }

    fn request_error(
        &self,
        url: &ArtifactUrl,
        e: reqwest::Error,
        reading_body: bool,
    ) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else if reading_body {
            FetchError::Body {
                url: url.to_string(),
                source: e,
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: e,
            }
        }
    }
}

impl<E: ArchiveExtractor> ArtifactFetcher for HttpFetcher<E> {
    fn fetch(&self, url: &ArtifactUrl, target_dir: &Path) -> FetchResult<FetchSummary> {
        let body = self.download(url)?;
        debug!(url = %url, bytes = body.len(), "artifact downloaded");

        let entries = self
            .extractor
            .extract(&mut body.as_slice(), target_dir)
            .map_err(|source| FetchError::Extraction {
                path: target_dir.to_path_buf(),
                source,
            })?;

        let summary = FetchSummary {
            bytes: body.len() as u64,
            entries,
        };
        info!(
            url = %url,
            dir = %target_dir.display(),
            bytes = summary.bytes,
            entries = summary.entries,
            "artifact extracted"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;
    use tokio::runtime::Runtime;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn runtime() -> Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    fn archive() -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let data = b"apiVersion: v1\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "manifests/cm.yaml", &data[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn local_url(server: &MockServer, artifact_path: &str) -> ArtifactUrl {
        ArtifactUrl::local(server.address().port(), artifact_path)
    }

    #[test]
    fn test_defaults() {
        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(fetcher.timeout(), DEFAULT_TIMEOUT);

        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(3)).unwrap();
        assert_eq!(fetcher.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_fetch_extracts_on_200() {
        let rt = runtime();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/gitrepository/flux-system/demo/v1.tar.gz"))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(archive()))
                .expect(1)
                .mount(&server),
        );

        let temp = TempDir::new().unwrap();
        let fetcher = HttpFetcher::new().unwrap();
        let summary = fetcher
            .fetch(
                &local_url(&server, "gitrepository/flux-system/demo/v1.tar.gz"),
                temp.path(),
            )
            .unwrap();

        assert_eq!(summary.entries, 1);
        assert!(summary.bytes > 0);
        assert_eq!(
            std::fs::read_to_string(temp.path().join("manifests/cm.yaml")).unwrap(),
            "apiVersion: v1\n"
        );
    }

    #[test]
    fn test_non_200_is_rejected_without_extraction() {
        let rt = runtime();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(204))
                .mount(&server),
        );

        let temp = TempDir::new().unwrap();
        let url = local_url(&server, "a/b/c.tar.gz");
        let err = HttpFetcher::new()
            .unwrap()
            .fetch(&url, temp.path())
            .unwrap_err();

        match err {
            FetchError::UnexpectedStatus {
                url: reported,
                expected,
                actual,
            } => {
                assert_eq!(reported, url.to_string());
                assert_eq!(expected, 200);
                assert_eq!(actual, 204);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_timeout() {
        let rt = runtime();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_bytes(archive())
                        .set_delay(Duration::from_secs(2)),
                )
                .mount(&server),
        );

        let fetcher = HttpFetcher::with_timeout(Duration::from_millis(200)).unwrap();
        let err = fetcher
            .download(&local_url(&server, "slow.tar.gz"))
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout { .. }), "{err}");
    }

    #[test]
    fn test_connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = HttpFetcher::new()
            .unwrap()
            .download(&ArtifactUrl::local(port, "x.tar.gz"))
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport { .. }), "{err}");
    }

    #[test]
    fn test_garbage_body_is_extraction_error() {
        let rt = runtime();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_string("not an archive"))
                .mount(&server),
        );

        let temp = TempDir::new().unwrap();
        let err = HttpFetcher::new()
            .unwrap()
            .fetch(&local_url(&server, "x.tar.gz"), temp.path())
            .unwrap_err();

        assert!(matches!(err, FetchError::Extraction { .. }), "{err}");
    }
}

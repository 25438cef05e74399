//! HTTP raster source backed by a blocking reqwest client

use std::io::{Read, Write};
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::types::{RasterSource, SourceError};

/// User-Agent sent with every download.
const DEFAULT_USER_AGENT: &str = concat!("popgrid/", env!("CARGO_PKG_VERSION"));

/// Default request timeout (seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default streaming block size (bytes).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Raster source downloading over HTTP(S).
#[derive(Clone)]
pub struct ReqwestSource {
    client: reqwest::blocking::Client,
    chunk_size: usize,
}

impl ReqwestSource {
    /// Creates a source with the default timeout and chunk size.
    pub fn new() -> Result<Self, SourceError> {
        Self::with_options(Duration::from_secs(DEFAULT_TIMEOUT_SECS), DEFAULT_CHUNK_SIZE)
    }

    /// Creates a source with a custom timeout and streaming block size.
    pub fn with_options(timeout: Duration, chunk_size: usize) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| SourceError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            chunk_size: chunk_size.max(1),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl RasterSource for ReqwestSource {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, SourceError> {
        trace!(url = url, "HTTP GET request starting");

        let mut response = match self.client.get(url).send() {
            Ok(resp) => {
                debug!(url = url, status = resp.status().as_u16(), "HTTP response received");
                resp
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(SourceError::Http(format!("Request failed: {}", e)));
            }
        };

        if !response.status().is_success() {
            warn!(url = url, status = response.status().as_u16(), "HTTP error status");
            return Err(SourceError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let written = copy_chunked(&mut response, sink, self.chunk_size)?;
        sink.flush()?;
        trace!(url = url, bytes = written, "HTTP response body streamed");
        Ok(written)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Copy `reader` into `sink` through a fixed buffer of `chunk_size` bytes.
///
/// Read errors are transport failures, write errors are I/O failures.
pub(crate) fn copy_chunked(
    reader: &mut dyn Read,
    sink: &mut dyn Write,
    chunk_size: usize,
) -> Result<u64, SourceError> {
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SourceError::Http(format!("Failed to read response: {}", e))),
        };
        sink.write_all(&buffer[..n])?;
        total += n as u64;
    }

    Ok(total)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock raster source for testing.
    ///
    /// Serves bodies from a URL map; unknown URLs answer 404.
    #[derive(Default)]
    pub struct MockSource {
        pub bodies: HashMap<String, Vec<u8>>,
        pub failures: HashMap<String, u16>,
        pub calls: AtomicUsize,
    }

    impl MockSource {
        pub fn with_body(mut self, url: &str, body: Vec<u8>) -> Self {
            self.bodies.insert(url.to_string(), body);
            self
        }

        pub fn with_failure(mut self, url: &str, status: u16) -> Self {
            self.failures.insert(url.to_string(), status);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl RasterSource for MockSource {
        fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(status) = self.failures.get(url) {
                return Err(SourceError::Status {
                    status: *status,
                    url: url.to_string(),
                });
            }
            match self.bodies.get(url) {
                Some(body) => copy_chunked(&mut body.as_slice(), sink, 4),
                None => Err(SourceError::Status {
                    status: 404,
                    url: url.to_string(),
                }),
            }
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn test_copy_chunked_copies_everything() {
        let body: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let mut sink = Vec::new();

        let written = copy_chunked(&mut body.as_slice(), &mut sink, 1024).unwrap();

        assert_eq!(written, 10_000);
        assert_eq!(sink, body);
    }

    #[test]
    fn test_copy_chunked_read_error_is_transport_failure() {
        let mut sink = Vec::new();
        let err = copy_chunked(&mut FailingReader, &mut sink, 16).unwrap_err();
        assert!(matches!(err, SourceError::Http(_)));
        assert_eq!(err.kind(), crate::pipeline::FailureKind::DownloadFailure);
    }

    #[test]
    fn test_mock_source_success() {
        let mock = MockSource::default().with_body("http://example.com/a.tif", vec![1, 2, 3, 4]);
        let mut sink = Vec::new();

        let written = mock.fetch("http://example.com/a.tif", &mut sink).unwrap();

        assert_eq!(written, 4);
        assert_eq!(sink, vec![1, 2, 3, 4]);
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_mock_source_status_error() {
        let mock = MockSource::default().with_failure("http://example.com/a.tif", 503);
        let err = mock.fetch("http://example.com/a.tif", &mut Vec::new()).unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 503, .. }));
    }

    #[test]
    fn test_reqwest_source_clamps_chunk_size() {
        let source = ReqwestSource::with_options(Duration::from_secs(5), 0).unwrap();
        assert_eq!(source.chunk_size(), 1);
        assert_eq!(source.name(), "http");
    }
}

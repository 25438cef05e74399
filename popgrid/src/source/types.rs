//! Source types and traits

use std::io::Write;
use thiserror::Error;

use crate::pipeline::FailureKind;

/// Errors raised while fetching a raster from its source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport failure (connect, timeout, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Writing the body to the sink failed
    #[error("I/O error while streaming download: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::DownloadFailure
    }
}

/// Streamed fetch of a raster payload.
///
/// Implementors write the body into `sink` in bounded chunks and return the
/// number of bytes written. A failure may leave a partial body in the sink;
/// the caller owns its cleanup.
pub trait RasterSource: Send + Sync {
    /// Fetch `url` into `sink`.
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, SourceError>;

    /// Returns the source name for logging.
    fn name(&self) -> &str;
}

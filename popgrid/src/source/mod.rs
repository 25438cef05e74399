//! Raster source abstraction
//!
//! The acquirer never talks to the network directly. It asks a
//! [`RasterSource`] to stream a URL into a writer, which lets tests inject a
//! mock and keeps downloads bounded in memory.

mod http;
mod types;

pub use http::{ReqwestSource, DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT_SECS};
pub use types::{RasterSource, SourceError};

#[cfg(test)]
pub use http::tests::MockSource;

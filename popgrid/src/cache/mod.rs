//! Content-addressed file cache for downloaded rasters.
//!
//! Payloads are keyed by the SHA-256 of their source URL and paired with a
//! JSON sidecar recording the URL, capture time and size. Entries expire after
//! a configurable maximum age and are removed by [`CacheStore::sweep`].

mod path;
mod store;
mod types;

pub use store::CacheStore;
pub use types::{
    CacheEntry, CacheError, CacheKey, CacheMetadata, ClearResult, SweepResult, DEFAULT_MAX_AGE,
};

// Re-export path utilities for convenience
pub use path::{metadata_path, payload_path};

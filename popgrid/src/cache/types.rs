//! Core types for the raster cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::FailureKind;

/// Default maximum age of a cache entry (24 hours).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Content-addressed cache key derived from a source URL.
///
/// The key is the lowercase hex SHA-256 digest of the URL, which makes it
/// stable across runs and safe to use as a filename on every platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a source URL.
    pub fn from_url(url: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(url.as_bytes())))
    }

    /// Recover a key from a cache filename stem, if it is a well-formed digest.
    pub(super) fn from_stem(stem: &str) -> Option<Self> {
        let well_formed = stem.len() == 64
            && stem
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        well_formed.then(|| Self(stem.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sidecar metadata record stored next to every payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Source URL the payload was downloaded from
    pub url: String,
    /// When the payload was captured
    pub captured_at: DateTime<Utc>,
    /// Payload size in bytes
    pub size: u64,
}

impl CacheMetadata {
    /// Age of the entry relative to `now`. Entries captured in the future have age zero.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.captured_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// An entry is fresh only while `now - captured_at < max_age`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age_at(now) < max_age
    }
}

/// A validated cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload_path: PathBuf,
    pub captured_at: DateTime<Utc>,
    pub size: u64,
}

/// Cache-related errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Metadata record could not be read or parsed
    #[error("Cache read failure at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// Payload or metadata could not be written
    #[error("Cache write failure at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on the cache directory itself
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Failure classification recorded in run summaries.
    pub fn kind(&self) -> FailureKind {
        match self {
            CacheError::Read { .. } => FailureKind::CacheReadFailure,
            CacheError::Write { .. } | CacheError::Io(_) => FailureKind::CacheWriteFailure,
        }
    }
}

/// Result of a cache sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    /// Payload + metadata pairs removed because they expired
    pub entries_removed: usize,
    /// Payloads or metadata records removed because their partner was missing
    pub orphans_removed: usize,
    /// Abandoned staging files removed
    pub partials_removed: usize,
    /// Entries left in place because their metadata was unreadable
    pub entries_skipped: usize,
    /// Total bytes freed
    pub bytes_freed: u64,
}

/// Result of clearing the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearResult {
    pub files_deleted: usize,
    pub bytes_freed: u64,
}

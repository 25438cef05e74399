//! Content-addressed raster cache with time-based expiry.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::path::{
    is_staging_file, metadata_path, payload_path, METADATA_EXTENSION, PAYLOAD_EXTENSION,
    STAGING_EXTENSION, STAGING_PREFIX,
};
use super::types::{
    CacheEntry, CacheError, CacheKey, CacheMetadata, ClearResult, SweepResult, DEFAULT_MAX_AGE,
};

/// Disk cache for downloaded raster payloads.
///
/// Each entry is a payload file plus a JSON sidecar record, both named after
/// the SHA-256 of the source URL. A payload is only served while its sidecar
/// exists, agrees on size, and is younger than `max_age`.
///
/// Writes stage into a temporary file in the cache directory and are renamed
/// into place. The sidecar is written last, so a reader never pairs a payload
/// with a record that does not describe it. Operations on the same key are
/// serialized by a per-key lock, so the store can be shared across workers.
pub struct CacheStore {
    /// Cache directory root
    directory: PathBuf,
    /// Maximum age of a servable entry
    max_age: Duration,
    /// Per-key locks serializing commit and lookup
    key_locks: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl CacheStore {
    /// Open (creating if needed) a cache rooted at `directory`.
    pub fn new(directory: impl Into<PathBuf>, max_age: Duration) -> Result<Self, CacheError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;

        Ok(Self {
            directory,
            max_age,
            key_locks: DashMap::new(),
        })
    }

    /// Open a cache with the default 24 hour expiry.
    pub fn with_default_max_age(directory: impl Into<PathBuf>) -> Result<Self, CacheError> {
        Self::new(directory, DEFAULT_MAX_AGE)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Return the payload path for `url` if a fresh, complete entry exists.
    ///
    /// Unreadable metadata is logged and reported as a miss.
    pub fn lookup(&self, url: &str) -> Option<PathBuf> {
        self.lookup_at(url, Utc::now())
    }

    /// [`lookup`](Self::lookup) evaluated at an explicit instant.
    pub fn lookup_at(&self, url: &str, now: DateTime<Utc>) -> Option<PathBuf> {
        match self.entry_at(url, now) {
            Ok(Some(entry)) => {
                debug!(url = url, path = %entry.payload_path.display(), "Cache hit");
                Some(entry.payload_path)
            }
            Ok(None) => {
                debug!(url = url, "Cache miss");
                None
            }
            Err(e) => {
                warn!(url = url, error = %e, "Ignoring unreadable cache entry");
                None
            }
        }
    }

    /// Look up the full entry for `url` at `now`, surfacing read failures.
    pub fn entry_at(&self, url: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError> {
        let key = CacheKey::from_url(url);
        let lock = self.key_lock(&key);
        let _guard = lock.lock();

        let payload = payload_path(&self.directory, &key);
        let sidecar = metadata_path(&self.directory, &key);

        if !payload.is_file() || !sidecar.is_file() {
            return Ok(None);
        }

        let metadata = read_metadata(&sidecar)?;
        if metadata.url != url {
            return Err(CacheError::Read {
                path: sidecar,
                reason: format!("metadata describes a different URL: {}", metadata.url),
            });
        }

        let actual_size = fs::metadata(&payload)
            .map_err(|e| CacheError::Read {
                path: payload.clone(),
                reason: e.to_string(),
            })?
            .len();
        if actual_size != metadata.size {
            return Err(CacheError::Read {
                path: payload,
                reason: format!(
                    "payload is {} bytes but metadata records {}",
                    actual_size, metadata.size
                ),
            });
        }

        if !metadata.is_fresh_at(now, self.max_age) {
            debug!(url = url, captured_at = %metadata.captured_at, "Cache entry expired");
            return Ok(None);
        }

        Ok(Some(CacheEntry {
            key,
            payload_path: payload,
            captured_at: metadata.captured_at,
            size: metadata.size,
        }))
    }

    /// Store `bytes` as the payload for `url`, returning the payload path.
    pub fn store(&self, url: &str, bytes: &[u8]) -> Result<PathBuf, CacheError> {
        let mut staged = self.staging_file()?;
        if let Err(source) = staged.write_all(bytes).and_then(|_| staged.flush()) {
            return Err(CacheError::Write {
                path: staged.path().to_path_buf(),
                source,
            });
        }
        self.commit(url, staged)
    }

    /// Create a staging file inside the cache directory.
    ///
    /// Downloads stream into this file and are then handed to [`commit`](Self::commit).
    /// The file is deleted when dropped unless committed.
    pub fn staging_file(&self) -> Result<NamedTempFile, CacheError> {
        tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(&format!(".{}", STAGING_EXTENSION))
            .tempfile_in(&self.directory)
            .map_err(|source| CacheError::Write {
                path: self.directory.clone(),
                source,
            })
    }

    /// Move a fully written staging file into place as the payload for `url`.
    ///
    /// On failure the staged payload is removed and no partial entry remains.
    pub fn commit(&self, url: &str, staged: NamedTempFile) -> Result<PathBuf, CacheError> {
        let key = CacheKey::from_url(url);
        let lock = self.key_lock(&key);
        let _guard = lock.lock();

        let payload = payload_path(&self.directory, &key);
        let sidecar = metadata_path(&self.directory, &key);

        let size = staged
            .as_file()
            .sync_all()
            .and_then(|_| staged.as_file().metadata())
            .map_err(|source| CacheError::Write {
                path: staged.path().to_path_buf(),
                source,
            })?
            .len();

        // Drop the old record first so the old sidecar never describes the new payload.
        remove_if_exists(&sidecar).map_err(|source| CacheError::Write {
            path: sidecar.clone(),
            source,
        })?;

        staged.persist(&payload).map_err(|e| CacheError::Write {
            path: payload.clone(),
            source: e.error,
        })?;

        let metadata = CacheMetadata {
            url: url.to_string(),
            captured_at: Utc::now(),
            size,
        };
        if let Err(e) = self.write_metadata(&sidecar, &metadata) {
            if let Err(cleanup) = fs::remove_file(&payload) {
                warn!(
                    path = %payload.display(),
                    error = %cleanup,
                    "Failed to remove payload after metadata write failure"
                );
            }
            return Err(e);
        }

        debug!(url = url, path = %payload.display(), bytes = size, "Cached payload");
        Ok(payload)
    }

    /// Delete every entry older than `max_age`, returning what was removed.
    ///
    /// A bad entry never aborts the sweep; it is logged and skipped.
    pub fn sweep(&self, max_age: Duration) -> SweepResult {
        self.sweep_at(max_age, Utc::now())
    }

    /// [`sweep`](Self::sweep) evaluated at an explicit instant.
    pub fn sweep_at(&self, max_age: Duration, now: DateTime<Utc>) -> SweepResult {
        let mut result = SweepResult::default();

        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.directory.display(), error = %e, "Cannot read cache directory");
                return result;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            if is_staging_file(&path) {
                if file_age(&path, now).is_some_and(|age| age >= max_age) {
                    result.bytes_freed += remove_counted(&path);
                    result.partials_removed += 1;
                }
                continue;
            }

            match path.extension().and_then(|e| e.to_str()) {
                Some(METADATA_EXTENSION) => {
                    let payload = path.with_extension(PAYLOAD_EXTENSION);
                    if !payload.exists() {
                        self.remove_orphan(&path, &payload, &mut result);
                        continue;
                    }
                    match read_metadata(&path) {
                        Ok(metadata) if !metadata.is_fresh_at(now, max_age) => {
                            let lock = self.key_lock(&CacheKey::from_url(&metadata.url));
                            let _guard = lock.lock();
                            result.bytes_freed += remove_counted(&payload);
                            result.bytes_freed += remove_counted(&path);
                            result.entries_removed += 1;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "Skipping unreadable cache entry");
                            result.entries_skipped += 1;
                        }
                    }
                }
                Some(PAYLOAD_EXTENSION) => {
                    let sidecar = path.with_extension(METADATA_EXTENSION);
                    if !sidecar.exists() {
                        self.remove_orphan(&path, &sidecar, &mut result);
                    }
                }
                _ => {}
            }
        }

        info!(
            removed = result.entries_removed,
            orphans = result.orphans_removed,
            partials = result.partials_removed,
            skipped = result.entries_skipped,
            bytes_freed = result.bytes_freed,
            "Cleared {} expired cache entries",
            result.entries_removed
        );

        result
    }

    /// Total size in bytes of all cached payloads.
    pub fn total_size(&self) -> u64 {
        self.payload_files()
            .filter_map(|path| fs::metadata(path).ok())
            .map(|m| m.len())
            .sum()
    }

    /// Number of cached payloads.
    pub fn entry_count(&self) -> usize {
        self.payload_files().count()
    }

    /// Remove every payload, sidecar and staging file.
    pub fn clear(&self) -> Result<ClearResult, CacheError> {
        let mut result = ClearResult::default();

        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let ext = path.extension().and_then(|e| e.to_str());
            if matches!(ext, Some(PAYLOAD_EXTENSION) | Some(METADATA_EXTENSION))
                || is_staging_file(&path)
            {
                let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                fs::remove_file(&path)?;
                result.files_deleted += 1;
                result.bytes_freed += size;
            }
        }

        info!(
            files = result.files_deleted,
            bytes = result.bytes_freed,
            "Cleared raster cache"
        );
        Ok(result)
    }

    fn payload_files(&self) -> impl Iterator<Item = PathBuf> {
        fs::read_dir(&self.directory)
            .into_iter()
            .flatten()
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(PAYLOAD_EXTENSION)
            })
    }

    /// Remove `path` if its `partner` is still missing once the key is locked.
    ///
    /// A commit briefly leaves a payload without its sidecar; holding the key
    /// lock waits that out.
    fn remove_orphan(&self, path: &Path, partner: &Path, result: &mut SweepResult) {
        let key = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(CacheKey::from_stem);
        let lock = key.map(|key| self.key_lock(&key));
        let _guard = lock.as_ref().map(|lock| lock.lock());

        if partner.exists() || !path.is_file() {
            return;
        }
        result.bytes_freed += remove_counted(path);
        result.orphans_removed += 1;
    }

    fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        self.key_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn write_metadata(&self, sidecar: &Path, metadata: &CacheMetadata) -> Result<(), CacheError> {
        let to_write_error = |source: std::io::Error| CacheError::Write {
            path: sidecar.to_path_buf(),
            source,
        };

        let mut staged = self.staging_file()?;
        serde_json::to_writer_pretty(&mut staged, metadata)
            .map_err(|e| to_write_error(std::io::Error::other(e)))?;
        staged.flush().map_err(to_write_error)?;
        staged.persist(sidecar).map_err(|e| to_write_error(e.error))?;
        Ok(())
    }
}

fn read_metadata(path: &Path) -> Result<CacheMetadata, CacheError> {
    let text = fs::read_to_string(path).map_err(|e| CacheError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| CacheError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Remove a file, returning its size if it was deleted.
fn remove_counted(path: &Path) -> u64 {
    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    match fs::remove_file(path) {
        Ok(()) => size,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove cache file");
            0
        }
    }
}

fn file_age(path: &Path, now: DateTime<Utc>) -> Option<Duration> {
    let modified: DateTime<Utc> = fs::metadata(path).ok()?.modified().ok()?.into();
    Some((now - modified).to_std().unwrap_or(Duration::ZERO))
}

//! Cache path construction and filename handling.

use super::types::CacheKey;
use std::path::{Path, PathBuf};

/// Extension of cached raster payloads.
pub const PAYLOAD_EXTENSION: &str = "tif";

/// Extension of sidecar metadata records.
pub const METADATA_EXTENSION: &str = "json";

/// Extension of in-flight staging files.
pub const STAGING_EXTENSION: &str = "part";

/// Prefix of in-flight staging files.
pub const STAGING_PREFIX: &str = ".staging-";

/// Construct the payload path for a cache key.
///
/// Entries are stored flat in the cache directory:
/// ```text
/// <cache_dir>/<sha256(url)>.tif
/// <cache_dir>/<sha256(url)>.json
/// ```
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use popgrid::cache::{payload_path, CacheKey};
///
/// let key = CacheKey::from_url("https://example.com/data.tif");
/// let path = payload_path(&PathBuf::from("/cache"), &key);
/// assert_eq!(path, PathBuf::from(format!("/cache/{}.tif", key)));
/// ```
pub fn payload_path(cache_dir: &Path, key: &CacheKey) -> PathBuf {
    cache_dir.join(format!("{}.{}", key, PAYLOAD_EXTENSION))
}

/// Construct the sidecar metadata path for a cache key.
pub fn metadata_path(cache_dir: &Path, key: &CacheKey) -> PathBuf {
    cache_dir.join(format!("{}.{}", key, METADATA_EXTENSION))
}

/// Returns true if the path is a staging file left behind by an interrupted write.
pub(super) fn is_staging_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.starts_with(STAGING_PREFIX)
        && path.extension().and_then(|e| e.to_str()) == Some(STAGING_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_and_metadata_share_stem() {
        let dir = PathBuf::from("/cache");
        let key = CacheKey::from_url("https://example.com/KEN/v1.0/M_0_4.tif");

        let payload = payload_path(&dir, &key);
        let metadata = metadata_path(&dir, &key);

        assert_eq!(payload.file_stem(), metadata.file_stem());
        assert!(payload.to_string_lossy().ends_with(".tif"));
        assert!(metadata.to_string_lossy().ends_with(".json"));
    }

    #[test]
    fn test_is_staging_file() {
        assert!(is_staging_file(Path::new("/cache/.staging-abc123.part")));
        assert!(!is_staging_file(Path::new("/cache/abc.tif")));
        assert!(!is_staging_file(Path::new("/cache/abc.part")));
    }
}

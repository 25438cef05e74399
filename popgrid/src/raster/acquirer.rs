//! Raster acquisition: URL resolution, cached streaming download, decode.

use std::path::Path;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use super::batch::{run_units, BatchResults};
use super::decode;
use super::types::{AcquireError, DecodeError, GridHandle, RasterMetadata};
use crate::cache::CacheStore;
use crate::demography::{AgeBand, CountryCode, Sex, UnitKey};
use crate::pipeline::FailureKind;
use crate::source::{RasterSource, SourceError};

/// Build the source URL for a unit: `{base}/{country}/v1.0/{sex}_{age_band}.tif`.
///
/// Pure and deterministic; a trailing slash on `base_url` is ignored.
///
/// # Example
///
/// ```
/// use popgrid::demography::{AgeBand, CountryCode, Sex, UnitKey};
/// use popgrid::raster::resolve_url;
///
/// let unit = UnitKey::new(CountryCode::new("KEN").unwrap(), Sex::Male, AgeBand::from_raw("0_4"));
/// assert_eq!(
///     resolve_url("https://data.example.org/pop/", &unit),
///     "https://data.example.org/pop/KEN/v1.0/M_0_4.tif"
/// );
/// ```
pub fn resolve_url(base_url: &str, unit: &UnitKey) -> String {
    format!(
        "{}/{}/v1.0/{}_{}.tif",
        base_url.trim_end_matches('/'),
        unit.country,
        unit.sex,
        unit.age_band
    )
}

/// Loads population rasters through the cache, falling back to the source.
///
/// Downloads stream into a temporary file and are decoded before they are
/// committed to the cache, so a payload that does not decode is never cached.
pub struct RasterAcquirer {
    base_url: String,
    source: Arc<dyn RasterSource>,
    cache: Option<Arc<CacheStore>>,
    workers: usize,
}

impl RasterAcquirer {
    pub fn new(base_url: impl Into<String>, source: Arc<dyn RasterSource>) -> Self {
        Self {
            base_url: base_url.into(),
            source,
            cache: None,
            workers: 1,
        }
    }

    pub fn with_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Number of units fetched concurrently by [`batch_load`](Self::batch_load).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn cache(&self) -> Option<&Arc<CacheStore>> {
        self.cache.as_ref()
    }

    pub fn resolve_url(&self, unit: &UnitKey) -> String {
        resolve_url(&self.base_url, unit)
    }

    /// Load and decode the grid for one unit.
    pub fn load(&self, unit: &UnitKey, use_cache: bool) -> Result<GridHandle, AcquireError> {
        let grid = self.acquire(unit, use_cache, decode::decode_path)?;
        info!(unit = %unit, width = grid.width(), height = grid.height(), "Successfully loaded raster");
        Ok(grid)
    }

    /// Read a unit's spatial metadata without keeping its pixels.
    pub fn probe(&self, unit: &UnitKey, use_cache: bool) -> Result<RasterMetadata, AcquireError> {
        self.acquire(unit, use_cache, decode::read_metadata)
    }

    /// Load every country × sex × age-band combination.
    ///
    /// Each unit succeeds or fails on its own; the caller inspects the result
    /// arena for failures. Order follows country, then sex, then age band.
    pub fn batch_load(
        &self,
        countries: &[CountryCode],
        age_bands: &[AgeBand],
        sexes: &[Sex],
        use_cache: bool,
    ) -> BatchResults<Result<GridHandle, AcquireError>> {
        let units = UnitKey::expand(countries, sexes, age_bands);
        let results = run_units(&units, self.workers, |unit| {
            let result = self.load(unit, use_cache);
            if let Err(e) = &result {
                warn!(unit = %unit, error = %e, "Failed to load raster");
            }
            result
        });

        info!(
            requested = results.len(),
            loaded = results.success_count(),
            failed = results.failure_count(),
            "Batch load complete"
        );
        results
    }

    fn acquire<T>(
        &self,
        unit: &UnitKey,
        use_cache: bool,
        read: impl Fn(&UnitKey, &Path) -> Result<T, DecodeError>,
    ) -> Result<T, AcquireError> {
        let url = self.resolve_url(unit);
        let cache = self.cache.as_deref().filter(|_| use_cache);

        if let Some(cache) = cache {
            if let Some(path) = cache.lookup(&url) {
                match read(unit, &path) {
                    Ok(value) => {
                        debug!(unit = %unit, path = %path.display(), "Using cached raster");
                        return Ok(value);
                    }
                    Err(e) => warn!(
                        unit = %unit,
                        kind = %FailureKind::CacheReadFailure,
                        error = %e,
                        "Cached raster is unreadable, downloading again"
                    ),
                }
            }
        }

        let staged = self
            .download(&url, cache)
            .map_err(|source| AcquireError::Download {
                unit: unit.clone(),
                source,
            })?;

        let value = read(unit, staged.path()).map_err(|source| AcquireError::Decode {
            unit: unit.clone(),
            source,
        })?;

        if let Some(cache) = cache {
            if let Err(e) = cache.commit(&url, staged) {
                warn!(unit = %unit, kind = %e.kind(), error = %e, "Failed to cache raster");
            }
        }

        Ok(value)
    }

    /// Stream `url` into a temporary file. The file is removed if anything fails.
    fn download(&self, url: &str, cache: Option<&CacheStore>) -> Result<NamedTempFile, SourceError> {
        let mut staged = match cache.map(CacheStore::staging_file) {
            Some(Ok(file)) => file,
            Some(Err(e)) => {
                warn!(error = %e, "Cannot stage download in cache directory, using system temp");
                NamedTempFile::new()?
            }
            None => NamedTempFile::new()?,
        };

        debug!(url = url, source = self.source.name(), "Downloading raster");
        match self.source.fetch(url, &mut staged) {
            Ok(bytes) => {
                debug!(url = url, bytes = bytes, "Download complete");
                Ok(staged)
            }
            Err(e) => {
                error!(url = url, error = %e, "Download failed");
                Err(e)
            }
        }
    }
}

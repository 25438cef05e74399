//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::boundary::BoundaryFields;
use crate::demography::{AgeBand, CountryCode, Sex};

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Raster source and the units to request
    pub source: SourceSettings,
    /// Display names of known countries
    pub countries: BTreeMap<CountryCode, String>,
    /// District boundary files
    pub boundaries: BoundarySettings,
    /// Raster cache settings
    pub cache: CacheSettings,
    /// Download settings
    pub download: DownloadSettings,
    /// Pipeline execution settings
    pub pipeline: PipelineSettings,
    /// Output artifact settings
    pub output: OutputSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Raster source configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    /// Base URL; units resolve to `{base_url}/{country}/v1.0/{sex}_{age_band}.tif`
    pub base_url: String,
    /// Countries processed by default
    pub countries: Vec<CountryCode>,
    /// Age bands processed by default
    pub age_bands: Vec<AgeBand>,
    /// Sexes processed by default
    pub sexes: Vec<Sex>,
}

/// Boundary file configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundarySettings {
    /// Directory holding the per-country boundary files
    pub directory: PathBuf,
    /// File name pattern; `{country}` is replaced by the country code
    pub file_pattern: String,
    /// Property holding the parent region name
    pub region_field: String,
    /// Property holding the district name
    pub district_field: String,
    /// Property holding the unique district identifier
    pub id_field: String,
}

impl BoundarySettings {
    /// Path of the boundary file for `country`.
    pub fn file_for(&self, country: &CountryCode) -> PathBuf {
        self.directory
            .join(self.file_pattern.replace("{country}", country.as_str()))
    }

    /// Property names in the form the registry expects.
    pub fn fields(&self) -> BoundaryFields {
        BoundaryFields {
            region: self.region_field.clone(),
            district: self.district_field.clone(),
            district_id: self.id_field.clone(),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Whether downloads are cached
    pub enabled: bool,
    /// Cache directory path
    pub directory: PathBuf,
    /// Age after which a cached raster is downloaded again
    pub max_age: Duration,
}

/// Download configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSettings {
    /// Request timeout in seconds
    pub timeout: u64,
    /// Streaming block size in bytes
    pub chunk_size: usize,
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Units processed concurrently (1 = sequential)
    pub workers: usize,
    /// Remove expired cache entries before the run
    pub sweep_cache_first: bool,
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    /// Directory receiving CSV and JSON artifacts
    pub directory: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

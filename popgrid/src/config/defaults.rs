//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::settings::*;
use crate::cache::DEFAULT_MAX_AGE;
use crate::demography::{AgeBand, CountryCode, Sex};
use crate::source::{DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT_SECS};

/// WorldPop age/sex structures, constrained 1 km grids.
pub const DEFAULT_BASE_URL: &str =
    "https://data.worldpop.org/GIS/AgeSex_structures/Global_2015_2030_2025/1km_ua/constrained";

/// Countries known out of the box, with display names.
pub const DEFAULT_COUNTRIES: [(&str, &str); 2] = [("KEN", "Kenya"), ("UGA", "Uganda")];

pub const DEFAULT_BOUNDARY_DIRECTORY: &str = "assets/gadm";
pub const DEFAULT_BOUNDARY_PATTERN: &str = "gadm41_{country}_2.json";
pub const DEFAULT_REGION_FIELD: &str = "NAME_1";
pub const DEFAULT_DISTRICT_FIELD: &str = "NAME_2";
pub const DEFAULT_ID_FIELD: &str = "GID_2";

pub const DEFAULT_CACHE_MAX_AGE: Duration = DEFAULT_MAX_AGE;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = DEFAULT_TIMEOUT_SECS;
pub const DEFAULT_DOWNLOAD_CHUNK_SIZE: usize = DEFAULT_CHUNK_SIZE;
pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "outputs";
pub const DEFAULT_LOG_FILE: &str = "logs/popgrid.log";

/// Default cache directory (`~/.cache/popgrid` on Linux).
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("popgrid")
}

fn default_countries() -> BTreeMap<CountryCode, String> {
    DEFAULT_COUNTRIES
        .iter()
        .filter_map(|(code, name)| CountryCode::new(code).ok().map(|c| (c, name.to_string())))
        .collect()
}

impl Default for ConfigFile {
    fn default() -> Self {
        let countries = default_countries();
        Self {
            source: SourceSettings {
                base_url: DEFAULT_BASE_URL.to_string(),
                countries: countries.keys().cloned().collect(),
                age_bands: AgeBand::standard(),
                sexes: Sex::ALL.to_vec(),
            },
            countries,
            boundaries: BoundarySettings {
                directory: PathBuf::from(DEFAULT_BOUNDARY_DIRECTORY),
                file_pattern: DEFAULT_BOUNDARY_PATTERN.to_string(),
                region_field: DEFAULT_REGION_FIELD.to_string(),
                district_field: DEFAULT_DISTRICT_FIELD.to_string(),
                id_field: DEFAULT_ID_FIELD.to_string(),
            },
            cache: CacheSettings {
                enabled: true,
                directory: default_cache_dir(),
                max_age: DEFAULT_CACHE_MAX_AGE,
            },
            download: DownloadSettings {
                timeout: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
                chunk_size: DEFAULT_DOWNLOAD_CHUNK_SIZE,
            },
            pipeline: PipelineSettings {
                workers: DEFAULT_WORKERS,
                sweep_cache_first: false,
            },
            output: OutputSettings {
                directory: PathBuf::from(DEFAULT_OUTPUT_DIRECTORY),
            },
            logging: LoggingSettings {
                file: PathBuf::from(DEFAULT_LOG_FILE),
            },
        }
    }
}

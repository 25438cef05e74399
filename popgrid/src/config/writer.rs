//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::duration::format_duration;
use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let join = |items: Vec<String>| items.join(", ");
    let source_countries = join(config.source.countries.iter().map(|c| c.to_string()).collect());
    let age_bands = join(config.source.age_bands.iter().map(|b| b.to_string()).collect());
    let sexes = join(config.source.sexes.iter().map(|s| s.code().to_string()).collect());
    let countries: String = config
        .countries
        .iter()
        .map(|(code, name)| format!("{} = {}\n", code, name))
        .collect();

    format!(
        r#"[source]
; Base URL of the raster store. Each unit resolves to
;   <base_url>/<COUNTRY>/v1.0/<sex>_<age_band>.tif
base_url = {}
; Countries processed by `popgrid run` when --countries is not given.
; Every code listed here must also appear in [countries].
countries = {}
; Age bands, comma separated (e.g. 0_4, 5_9, 80_plus)
age_bands = {}
; Sexes: M, F or both
sexes = {}

[countries]
; Known countries: <ISO3 code> = <display name>
{}
[boundaries]
; Directory holding one GeoJSON boundary file per country
directory = {}
; File name pattern; {{country}} is replaced with the country code
file_pattern = {}
; Feature properties holding the region name, district name and district id
region_field = {}
district_field = {}
id_field = {}

[cache]
; Set to false to always download rasters
enabled = {}
; Directory for cached rasters
; If empty, defaults to ~/.cache/popgrid (Linux) or platform cache directory
directory = {}
; Entries older than this are downloaded again
; Supports: s, m, h, d suffixes (e.g., 90m, 24h, 7d)
max_age = {}

[download]
; Request timeout in seconds
timeout = {}
; Streaming block size (supports KB, MB suffixes)
chunk_size = {}

[pipeline]
; Number of units processed concurrently (1 = sequential)
workers = {}
; Remove expired cache entries before each run
sweep_cache_first = {}

[output]
; Directory receiving the CSV tables and run_summary.json
directory = {}

[logging]
; Log file path
file = {}
"#,
        config.source.base_url,
        source_countries,
        age_bands,
        sexes,
        countries,
        path_to_string(&config.boundaries.directory),
        config.boundaries.file_pattern,
        config.boundaries.region_field,
        config.boundaries.district_field,
        config.boundaries.id_field,
        config.cache.enabled,
        path_to_string(&config.cache.directory),
        format_duration(config.cache.max_age),
        config.download.timeout,
        format_size(config.download.chunk_size),
        config.pipeline.workers,
        config.pipeline.sweep_cache_first,
        path_to_string(&config.output.directory),
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::super::settings::ConfigFile;
    use super::*;
    use crate::demography::{AgeBand, CountryCode, Sex};
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        let config = ConfigFile::default();
        config.save_to(&config_path).unwrap();

        let loaded = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_and_load_custom_values() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        let tza = CountryCode::new("TZA").unwrap();
        let mut config = ConfigFile::default();
        config.countries.insert(tza.clone(), "Tanzania".to_string());
        config.source.countries = vec![tza.clone()];
        config.source.age_bands = vec![AgeBand::from_raw("80_plus")];
        config.source.sexes = vec![Sex::Female];
        config.cache.max_age = Duration::from_secs(7 * 86400);
        config.download.timeout = 60;
        config.pipeline.workers = 4;
        config.output.directory = PathBuf::from("/tmp/popgrid-out");

        config.save_to(&config_path).unwrap();
        let loaded = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(loaded.source.countries, vec![tza.clone()]);
        assert_eq!(loaded.countries.get(&tza).map(String::as_str), Some("Tanzania"));
        assert_eq!(loaded.source.sexes, vec![Sex::Female]);
        assert_eq!(loaded.cache.max_age, Duration::from_secs(7 * 86400));
        assert_eq!(loaded.download.timeout, 60);
        assert_eq!(loaded.pipeline.workers, 4);
        assert_eq!(loaded.output.directory, PathBuf::from("/tmp/popgrid-out"));
    }

    #[test]
    fn test_path_to_string_collapses_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path_to_string(&home.join("cache")), "~/cache");
        }
        assert_eq!(path_to_string(Path::new("/var/data")), "/var/data");
    }
}

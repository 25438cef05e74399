//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::duration::parse_duration;
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;
use crate::demography::{AgeBand, CountryCode, Sex};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [countries] first so [source] can be checked against it
    if let Some(section) = ini.section(Some("countries")) {
        let mut countries = std::collections::BTreeMap::new();
        for (key, name) in section.iter() {
            let code = CountryCode::new(key).map_err(|e| invalid("countries", key, name, e))?;
            countries.insert(code, name.trim().to_string());
        }
        if !countries.is_empty() {
            config.source.countries = countries.keys().cloned().collect();
            config.countries = countries;
        }
    }

    // [source] section
    if let Some(section) = ini.section(Some("source")) {
        if let Some(v) = non_empty(section, "base_url") {
            if !(v.starts_with("http://") || v.starts_with("https://")) {
                return Err(invalid("source", "base_url", v, "must start with http:// or https://"));
            }
            config.source.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = non_empty(section, "countries") {
            let countries: Vec<CountryCode> = parse_list(v, "source", "countries")?;
            if let Some(unknown) = countries.iter().find(|c| !config.countries.contains_key(c)) {
                return Err(invalid(
                    "source",
                    "countries",
                    v,
                    format!("unknown country '{}' - add it to [countries]", unknown),
                ));
            }
            config.source.countries = countries;
        }
        if let Some(v) = non_empty(section, "age_bands") {
            config.source.age_bands = parse_list(v, "source", "age_bands")?;
        }
        if let Some(v) = non_empty(section, "sexes") {
            config.source.sexes = parse_list(v, "source", "sexes")?;
        }
    }

    // [boundaries] section
    if let Some(section) = ini.section(Some("boundaries")) {
        if let Some(v) = non_empty(section, "directory") {
            config.boundaries.directory = expand_tilde(v);
        }
        if let Some(v) = non_empty(section, "file_pattern") {
            if !v.contains("{country}") {
                return Err(invalid(
                    "boundaries",
                    "file_pattern",
                    v,
                    "must contain the {country} placeholder",
                ));
            }
            config.boundaries.file_pattern = v.to_string();
        }
        if let Some(v) = non_empty(section, "region_field") {
            config.boundaries.region_field = v.to_string();
        }
        if let Some(v) = non_empty(section, "district_field") {
            config.boundaries.district_field = v.to_string();
        }
        if let Some(v) = non_empty(section, "id_field") {
            config.boundaries.id_field = v.to_string();
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = non_empty(section, "enabled") {
            config.cache.enabled = parse_bool(v).ok_or_else(|| {
                invalid("cache", "enabled", v, "must be true or false")
            })?;
        }
        if let Some(v) = non_empty(section, "directory") {
            config.cache.directory = expand_tilde(v);
        }
        if let Some(v) = non_empty(section, "max_age") {
            config.cache.max_age = parse_duration(v).map_err(|e| invalid("cache", "max_age", v, e))?;
        }
    }

    // [download] section
    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = non_empty(section, "timeout") {
            config.download.timeout = v
                .parse()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| invalid("download", "timeout", v, "must be a positive integer (seconds)"))?;
        }
        if let Some(v) = non_empty(section, "chunk_size") {
            config.download.chunk_size = parse_size(v)
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| {
                    invalid("download", "chunk_size", v, "expected a non-zero size like '8KB' or '1MB'")
                })?;
        }
    }

    // [pipeline] section
    if let Some(section) = ini.section(Some("pipeline")) {
        if let Some(v) = non_empty(section, "workers") {
            config.pipeline.workers = v
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("pipeline", "workers", v, "must be a positive integer"))?;
        }
        if let Some(v) = non_empty(section, "sweep_cache_first") {
            config.pipeline.sweep_cache_first = parse_bool(v).ok_or_else(|| {
                invalid("pipeline", "sweep_cache_first", v, "must be true or false")
            })?;
        }
    }

    // [output] section
    if let Some(section) = ini.section(Some("output")) {
        if let Some(v) = non_empty(section, "directory") {
            config.output.directory = expand_tilde(v);
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section, "file") {
            config.logging.file = expand_tilde(v);
        }
    }

    Ok(config)
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn invalid(
    section: &str,
    key: &str,
    value: &str,
    reason: impl ToString,
) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a comma-separated list, failing on the first bad item.
fn parse_list<T>(value: &str, section: &str, key: &str) -> Result<Vec<T>, ConfigFileError>
where
    T: FromStr,
    T::Err: ToString,
{
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.parse::<T>().map_err(|e| invalid(section, key, value, e)))
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Expand a leading `~` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/").or_else(|| (path == "~").then_some("")) {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

//! Demographic vocabulary shared by every pipeline stage.
//!
//! Countries, sexes and age bands identify a raster; together they form the
//! [`UnitKey`] that every acquisition and aggregation result is filed under.
//! This module also recognizes the WorldPop filename convention
//! (`M_0_4.tif`, `F_80_plus.tif`).

mod types;

pub use types::{
    AgeBand, AgeBin, CountryCode, DemographyError, Sex, UnitKey, STANDARD_AGE_BANDS,
};

use tracing::warn;

/// Components parsed from a raster filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterFilename {
    pub sex: Sex,
    /// Lower bound of the band in years
    pub age_start: u32,
    /// Upper bound, or `"plus"` for the open-ended band
    pub age_end: String,
    pub age_band: AgeBand,
    pub filename: String,
}

impl RasterFilename {
    /// Display label for the band (`"80+"`, `"0-4"`).
    pub fn display_label(&self) -> String {
        self.age_band.display_label()
    }
}

/// Parse a WorldPop raster filename such as `M_0_4.tif` or a full URL ending in one.
///
/// Returns `None` (and logs a warning) for names that do not follow the
/// `<sex>_<start>_<end|plus>.tif` convention.
///
/// # Example
///
/// ```
/// use popgrid::demography::{parse_raster_filename, Sex};
///
/// let parsed = parse_raster_filename("https://host/KEN/v1.0/F_80_plus.tif").unwrap();
/// assert_eq!(parsed.sex, Sex::Female);
/// assert_eq!(parsed.age_start, 80);
/// assert_eq!(parsed.display_label(), "80+");
/// ```
pub fn parse_raster_filename(name: &str) -> Option<RasterFilename> {
    let basename = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let parsed = basename.strip_suffix(".tif").and_then(|stem| {
        let mut parts = stem.splitn(3, '_');
        let sex: Sex = parts.next()?.parse().ok()?;
        let age_start: u32 = parts.next()?.parse().ok()?;
        let age_end = parts.next()?;
        if age_end != "plus" && age_end.parse::<u32>().is_err() {
            return None;
        }
        let age_band = AgeBand::parse(&format!("{}_{}", age_start, age_end)).ok()?;
        Some(RasterFilename {
            sex,
            age_start,
            age_end: age_end.to_string(),
            age_band,
            filename: basename.to_string(),
        })
    });

    if parsed.is_none() {
        warn!(filename = basename, "Invalid raster filename format");
    }
    parsed
}

/// Extract a known country code from a source URL path segment.
pub fn country_from_url(url: &str, known: &[CountryCode]) -> Option<CountryCode> {
    let found = url
        .split('/')
        .filter_map(|segment| CountryCode::new(segment).ok())
        .find(|code| known.contains(code));

    if found.is_none() {
        warn!(url = url, "Could not extract country from URL");
    }
    found
}

/// Validate parsed filename metadata against the configured vocabulary.
pub fn validate_filename(parsed: &RasterFilename, sexes: &[Sex], age_bands: &[AgeBand]) -> bool {
    if !sexes.contains(&parsed.sex) {
        return false;
    }
    if !age_bands.contains(&parsed.age_band) {
        warn!(age_band = %parsed.age_band, "Unrecognized age band");
        return false;
    }
    true
}

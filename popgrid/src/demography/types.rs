//! Demographic type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The 17 WorldPop age bands, in ascending order.
///
/// The final band is open-ended and uses the `plus` suffix instead of an
/// upper bound.
pub const STANDARD_AGE_BANDS: [&str; 17] = [
    "0_4", "5_9", "10_14", "15_19", "20_24", "25_29", "30_34", "35_39", "40_44", "45_49", "50_54",
    "55_59", "60_64", "65_69", "70_74", "75_79", "80_plus",
];

const CHILD_BANDS: [&str; 3] = ["0_4", "5_9", "10_14"];

const WORKING_AGE_BANDS: [&str; 9] = [
    "15_19", "20_24", "25_29", "30_34", "35_39", "40_44", "45_49", "50_54", "55_59",
];

const ELDERLY_BANDS: [&str; 5] = ["60_64", "65_69", "70_74", "75_79", "80_plus"];

/// Errors raised when parsing demographic identifiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DemographyError {
    /// Country code is not a three-letter alphabetic code
    #[error("Invalid country code '{0}' - expected three letters such as KEN")]
    InvalidCountry(String),

    /// Sex is not one of M/F
    #[error("Invalid sex '{0}' - expected M or F")]
    InvalidSex(String),

    /// Age band does not follow the `<start>_<end>` / `<start>_plus` convention
    #[error("Invalid age band '{0}' - expected a form like 0_4 or 80_plus")]
    InvalidAgeBand(String),
}

/// ISO 3166-1 alpha-3 country code, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    /// Parse and normalize a country code (`"ken"` becomes `"KEN"`).
    pub fn new(code: &str) -> Result<Self, DemographyError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DemographyError::InvalidCountry(code.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CountryCode {
    type Err = DemographyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = DemographyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

/// Sex dimension of the rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    /// Both sexes in raster naming order.
    pub const ALL: [Sex; 2] = [Sex::Male, Sex::Female];

    /// Single-letter code used in raster filenames and output tables.
    pub fn code(self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Sex {
    type Err = DemographyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "M" | "m" => Ok(Sex::Male),
            "F" | "f" => Ok(Sex::Female),
            other => Err(DemographyError::InvalidSex(other.to_string())),
        }
    }
}

/// Broad age classes used by the indicator calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeBin {
    /// Ages 0-14
    Child,
    /// Ages 15-59
    WorkingAge,
    /// Ages 60 and over
    Elderly,
}

/// An age band in raster naming form (`"0_4"`, `"80_plus"`).
///
/// Non-standard bands are representable so that tables produced elsewhere can
/// still be summarized; they simply do not classify into any [`AgeBin`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgeBand(String);

impl AgeBand {
    /// Parse an age band, validating the `<start>_<end>` or `<start>_plus` form.
    pub fn parse(band: &str) -> Result<Self, DemographyError> {
        let band = band.trim();
        let invalid = || DemographyError::InvalidAgeBand(band.to_string());

        let (start, end) = band.split_once('_').ok_or_else(invalid)?;
        let start: u32 = start.parse().map_err(|_| invalid())?;
        if end != "plus" {
            let end: u32 = end.parse().map_err(|_| invalid())?;
            if end < start {
                return Err(invalid());
            }
        }
        Ok(Self(band.to_string()))
    }

    /// Wrap a raw label without validation.
    pub fn from_raw(band: impl Into<String>) -> Self {
        Self(band.into())
    }

    /// All standard bands in ascending order.
    pub fn standard() -> Vec<AgeBand> {
        STANDARD_AGE_BANDS.iter().map(|b| AgeBand::from_raw(*b)).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is one of the 17 standard bands.
    pub fn is_standard(&self) -> bool {
        STANDARD_AGE_BANDS.contains(&self.0.as_str())
    }

    /// Classify into child / working-age / elderly using the fixed partition.
    pub fn classify(&self) -> Option<AgeBin> {
        let band = self.0.as_str();
        if CHILD_BANDS.contains(&band) {
            Some(AgeBin::Child)
        } else if WORKING_AGE_BANDS.contains(&band) {
            Some(AgeBin::WorkingAge)
        } else if ELDERLY_BANDS.contains(&band) {
            Some(AgeBin::Elderly)
        } else {
            None
        }
    }

    /// Label used by the visualization layer: `"80_plus"` → `"80+"`, `"0_4"` → `"0-4"`.
    pub fn display_label(&self) -> String {
        match self.0.strip_suffix("_plus") {
            Some(start) => format!("{}+", start),
            None => self.0.replace('_', "-"),
        }
    }
}

impl fmt::Display for AgeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AgeBand {
    type Err = DemographyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Composite key of one acquisition/aggregation unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    pub country: CountryCode,
    pub sex: Sex,
    pub age_band: AgeBand,
}

impl UnitKey {
    pub fn new(country: CountryCode, sex: Sex, age_band: AgeBand) -> Self {
        Self {
            country,
            sex,
            age_band,
        }
    }

    /// Identifier used in run summaries, e.g. `KEN_M_0_4`.
    pub fn identifier(&self) -> String {
        format!("{}_{}_{}", self.country, self.sex, self.age_band)
    }

    /// Expand the full country × sex × age-band space in nesting order.
    pub fn expand(countries: &[CountryCode], sexes: &[Sex], age_bands: &[AgeBand]) -> Vec<UnitKey> {
        let mut units = Vec::with_capacity(countries.len() * sexes.len() * age_bands.len());
        for country in countries {
            for sex in sexes {
                for band in age_bands {
                    units.push(UnitKey::new(country.clone(), *sex, band.clone()));
                }
            }
        }
        units
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.country, self.sex, self.age_band)
    }
}

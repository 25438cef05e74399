//! Zonal aggregation types and errors

use serde::Serialize;
use thiserror::Error;

use crate::boundary::GeometryError;
use crate::demography::{AgeBand, CountryCode, Sex, UnitKey};
use crate::pipeline::FailureKind;

/// Population of one district for one raster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistrictCell {
    pub country: CountryCode,
    pub sex: Sex,
    #[serde(rename = "age_group")]
    pub age_band: AgeBand,
    pub district_id: String,
    pub district: String,
    pub region: String,
    /// Sum of valid cell values inside the district
    pub population: f64,
    /// Number of valid cells that contributed
    pub pixel_count: usize,
}

/// A district left out of a unit's result.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedDistrict {
    pub unit: UnitKey,
    pub district_id: String,
    pub district: String,
    pub error: GeometryError,
}

/// Aggregation result for one raster.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZonalSummary {
    /// One cell per processed district, in boundary order
    pub cells: Vec<DistrictCell>,
    /// Districts whose geometry could not be used
    pub skipped: Vec<SkippedDistrict>,
}

impl ZonalSummary {
    pub fn total_population(&self) -> f64 {
        self.cells.iter().map(|cell| cell.population).sum()
    }
}

/// Errors that prevent aggregating a whole unit.
#[derive(Debug, Clone, Error)]
pub enum AggregateError {
    #[error("No admin boundaries loaded for {country}")]
    MissingBoundaries { country: CountryCode },

    #[error("Raster {unit} has no coordinate reference")]
    MissingCrs { unit: UnitKey },

    #[error("Cannot align boundaries with raster {unit}: {source}")]
    Reprojection {
        unit: UnitKey,
        #[source]
        source: GeometryError,
    },

    #[error("Raster {unit} has a singular pixel transform")]
    SingularTransform { unit: UnitKey },
}

impl AggregateError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AggregateError::MissingBoundaries { .. } => FailureKind::MissingBoundaries,
            AggregateError::MissingCrs { .. }
            | AggregateError::Reprojection { .. }
            | AggregateError::SingularTransform { .. } => FailureKind::GeometryFailure,
        }
    }
}

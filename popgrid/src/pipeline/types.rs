//! Run summary types and the pipeline's fatal errors.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::demography::{AgeBand, CountryCode, Sex, UnitKey};
use crate::raster::{BoundingBox, Crs, RasterMetadata};
use crate::zonal::SkippedDistrict;

/// Classification of every non-fatal failure a run can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    /// Cached payload unreadable; the unit falls back to the network
    CacheReadFailure,
    /// Payload could not be cached; the run continues
    CacheWriteFailure,
    /// Unit skipped
    DownloadFailure,
    /// Unit skipped
    DecodeFailure,
    /// Aggregation for the whole country is skipped
    MissingBoundaries,
    /// District (or unit, when the grid itself is unusable) skipped
    GeometryFailure,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::CacheReadFailure => "CacheReadFailure",
            FailureKind::CacheWriteFailure => "CacheWriteFailure",
            FailureKind::DownloadFailure => "DownloadFailure",
            FailureKind::DecodeFailure => "DecodeFailure",
            FailureKind::MissingBoundaries => "MissingBoundaries",
            FailureKind::GeometryFailure => "GeometryFailure",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a run.
///
/// Everything else is recorded in the [`PipelineRunSummary`] instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Output directory or artifact could not be written
    #[error("Failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact content could not be serialized
    #[error("Failed to serialize {path}: {reason}")]
    Serialize { path: PathBuf, reason: String },

    /// Run could not be set up from configuration
    #[error("Invalid pipeline configuration: {0}")]
    Config(String),
}

/// One unit missing from the combined table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFailure {
    /// Unit identifier (`KEN_M_0_4`)
    pub identifier: String,
    pub kind: FailureKind,
    /// Human-readable cause
    pub cause: String,
}

impl UnitFailure {
    pub fn new(unit: &UnitKey, kind: FailureKind, cause: impl ToString) -> Self {
        Self {
            identifier: unit.identifier(),
            kind,
            cause: cause.to_string(),
        }
    }
}

/// A district left out of one unit's aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDistrictRecord {
    pub identifier: String,
    pub district_id: String,
    pub district: String,
    pub kind: FailureKind,
    pub cause: String,
}

impl From<&SkippedDistrict> for SkippedDistrictRecord {
    fn from(skipped: &SkippedDistrict) -> Self {
        Self {
            identifier: skipped.unit.identifier(),
            district_id: skipped.district_id.clone(),
            district: skipped.district.clone(),
            kind: skipped.error.kind(),
            cause: skipped.error.to_string(),
        }
    }
}

/// Spatial reference of a country's rasters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialInfo {
    pub crs: Option<Crs>,
    pub bounds: BoundingBox,
    /// `(height, width)` in cells
    pub shape: (usize, usize),
}

impl From<&RasterMetadata> for SpatialInfo {
    fn from(metadata: &RasterMetadata) -> Self {
        Self {
            crs: metadata.crs,
            bounds: metadata.bounds,
            shape: (metadata.height, metadata.width),
        }
    }
}

/// Structured record of a completed run, persisted as `run_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRunSummary {
    pub started_at: DateTime<Utc>,
    pub countries: Vec<CountryCode>,
    pub sexes: Vec<Sex>,
    pub age_groups: Vec<AgeBand>,
    /// Grids loaded successfully
    pub total_rasters: usize,
    /// Identifiers of every unit absent from the combined table
    pub failed_rasters: Vec<String>,
    pub failures: Vec<UnitFailure>,
    pub skipped_districts: Vec<SkippedDistrictRecord>,
    /// Keyed by country; taken from the first grid loaded for it
    pub spatial_info: BTreeMap<CountryCode, SpatialInfo>,
    /// Wall-clock duration in seconds
    pub execution_time: f64,
}

/// One row of `raster_metadata.csv`.
///
/// Spatial columns are empty when the unit's grid never loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterMetadataRecord {
    pub country: CountryCode,
    pub sex: Sex,
    pub age_group: AgeBand,
    pub data_loaded: bool,
    pub crs: Option<String>,
    pub width: Option<usize>,
    pub height: Option<usize>,
    pub left: Option<f64>,
    pub bottom: Option<f64>,
    pub right: Option<f64>,
    pub top: Option<f64>,
}

impl RasterMetadataRecord {
    /// Record for a unit whose grid loaded.
    pub fn loaded(metadata: &RasterMetadata) -> Self {
        let unit = &metadata.unit;
        Self {
            country: unit.country.clone(),
            sex: unit.sex,
            age_group: unit.age_band.clone(),
            data_loaded: true,
            crs: metadata.crs.map(|crs| crs.to_string()),
            width: Some(metadata.width),
            height: Some(metadata.height),
            left: Some(metadata.bounds.left),
            bottom: Some(metadata.bounds.bottom),
            right: Some(metadata.bounds.right),
            top: Some(metadata.bounds.top),
        }
    }

    /// Record for a unit with no grid.
    pub fn missing(unit: &UnitKey) -> Self {
        Self {
            country: unit.country.clone(),
            sex: unit.sex,
            age_group: unit.age_band.clone(),
            data_loaded: false,
            crs: None,
            width: None,
            height: None,
            left: None,
            bottom: None,
            right: None,
            top: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::GeometryError;
    use crate::raster::GeoTransform;

    fn unit() -> UnitKey {
        UnitKey::new(CountryCode::new("KEN").unwrap(), Sex::Female, AgeBand::from_raw("80_plus"))
    }

    fn metadata() -> RasterMetadata {
        let transform = GeoTransform::from_origin(34.0, 1.0, 0.5, 0.5);
        RasterMetadata {
            unit: unit(),
            crs: Some(Crs::WGS84),
            transform,
            width: 4,
            height: 2,
            bounds: transform.bounds(4, 2),
            nodata: None,
        }
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::DownloadFailure.to_string(), "DownloadFailure");
        assert_eq!(
            serde_json::to_string(&FailureKind::MissingBoundaries).unwrap(),
            "\"MissingBoundaries\""
        );
    }

    #[test]
    fn test_unit_failure_uses_identifier() {
        let failure = UnitFailure::new(&unit(), FailureKind::DecodeFailure, "bad tiff");
        assert_eq!(failure.identifier, "KEN_F_80_plus");
        assert_eq!(failure.cause, "bad tiff");
    }

    #[test]
    fn test_skipped_district_record() {
        let skipped = SkippedDistrict {
            unit: unit(),
            district_id: "KEN.1_1".to_string(),
            district: "Nairobi".to_string(),
            error: GeometryError::NonFinite,
        };
        let record = SkippedDistrictRecord::from(&skipped);
        assert_eq!(record.identifier, "KEN_F_80_plus");
        assert_eq!(record.kind, FailureKind::GeometryFailure);
    }

    #[test]
    fn test_spatial_info_shape_is_height_width() {
        let info = SpatialInfo::from(&metadata());
        assert_eq!(info.shape, (2, 4));
        assert_eq!(info.bounds.left, 34.0);
        assert_eq!(info.bounds.top, 1.0);
    }

    #[test]
    fn test_metadata_records() {
        let loaded = RasterMetadataRecord::loaded(&metadata());
        assert!(loaded.data_loaded);
        assert_eq!(loaded.crs.as_deref(), Some("EPSG:4326"));
        assert_eq!(loaded.right, Some(36.0));
        assert_eq!(loaded.bottom, Some(0.0));

        let missing = RasterMetadataRecord::missing(&unit());
        assert!(!missing.data_loaded);
        assert!(missing.width.is_none());
    }
}

//! Boundary types and errors

use std::path::PathBuf;
use thiserror::Error;

use super::geometry::MultiPolygon;
use crate::pipeline::FailureKind;
use crate::raster::Crs;

/// Errors that prevent a country's boundary file from loading.
#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("Failed to read boundary file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid GeoJSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// File parsed but held no usable district
    #[error("No usable district features in {path}")]
    NoFeatures { path: PathBuf },

    #[error("Unsupported boundary coordinate reference '{0}'")]
    UnsupportedCrs(String),
}

impl BoundaryError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::MissingBoundaries
    }
}

/// Errors raised by a single district's geometry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("Degenerate geometry: {0}")]
    Degenerate(String),

    #[error("Geometry has non-finite coordinates")]
    NonFinite,

    #[error("Reprojection from {from} to {to} is not supported")]
    UnsupportedReprojection { from: Crs, to: Crs },
}

impl GeometryError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::GeometryFailure
    }
}

/// Property names mapped onto the canonical district schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryFields {
    /// Parent region name (GADM `NAME_1`)
    pub region: String,
    /// District name (GADM `NAME_2`)
    pub district: String,
    /// Unique district identifier (GADM `GID_2`)
    pub district_id: String,
}

impl Default for BoundaryFields {
    fn default() -> Self {
        Self {
            region: "NAME_1".to_string(),
            district: "NAME_2".to_string(),
            district_id: "GID_2".to_string(),
        }
    }
}

/// One administrative district in canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictBoundary {
    pub district_id: String,
    pub district: String,
    pub region: String,
    pub geometry: MultiPolygon,
    pub crs: Crs,
}

impl DistrictBoundary {
    /// Copy of this district with its geometry transformed into `target`.
    pub fn reprojected(&self, target: Crs) -> Result<DistrictBoundary, GeometryError> {
        Ok(DistrictBoundary {
            district_id: self.district_id.clone(),
            district: self.district.clone(),
            region: self.region.clone(),
            geometry: self.geometry.reproject(self.crs, target)?,
            crs: target,
        })
    }
}

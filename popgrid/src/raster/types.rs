//! Raster grid types and errors

use serde::Serialize;
use thiserror::Error;

use super::crs::Crs;
use crate::demography::UnitKey;
use crate::pipeline::FailureKind;
use crate::source::SourceError;

/// Affine pixel-to-geographic transform.
///
/// Coefficients follow the usual `a..f` naming:
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
///
/// where `(col, row)` are fractional pixel coordinates measured from the
/// top-left corner of the top-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// North-up transform from the top-left corner and pixel size.
    pub fn from_origin(west: f64, north: f64, x_size: f64, y_size: f64) -> Self {
        Self {
            a: x_size,
            b: 0.0,
            c: west,
            d: 0.0,
            e: -y_size,
            f: north,
        }
    }

    /// Map fractional pixel coordinates to geographic coordinates.
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Geographic coordinates of the center of cell `(col, row)`.
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Inverse transform, or `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<GeoTransform> {
        let det = self.a * self.e - self.b * self.d;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let a = self.e / det;
        let b = -self.b / det;
        let d = -self.d / det;
        let e = self.a / det;
        Some(GeoTransform {
            a,
            b,
            c: -(a * self.c + b * self.f),
            d,
            e,
            f: -(d * self.c + e * self.f),
        })
    }

    /// Extent covered by a `width` × `height` grid.
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        let (w, h) = (width as f64, height as f64);
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(w, 0.0),
            self.apply(0.0, h),
            self.apply(w, h),
        ];
        BoundingBox::from_points(corners.iter().copied()).unwrap_or(BoundingBox {
            left: self.c,
            bottom: self.f,
            right: self.c,
            top: self.f,
        })
    }

    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.e, self.f]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Axis-aligned extent in map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl BoundingBox {
    /// Smallest box containing every point, or `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let mut bbox = BoundingBox {
            left: x0,
            bottom: y0,
            right: x0,
            top: y0,
        };
        for (x, y) in iter {
            bbox.left = bbox.left.min(x);
            bbox.right = bbox.right.max(x);
            bbox.bottom = bbox.bottom.min(y);
            bbox.top = bbox.top.max(y);
        }
        Some(bbox)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right && y >= self.bottom && y <= self.top
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.left <= other.right
            && other.left <= self.right
            && self.bottom <= other.top
            && other.bottom <= self.top
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }
}

/// A decoded population grid plus its spatial metadata.
///
/// Values are stored row-major. The handle is immutable once built.
#[derive(Debug, Clone)]
pub struct GridHandle {
    unit: UnitKey,
    width: usize,
    height: usize,
    values: Vec<f64>,
    transform: GeoTransform,
    crs: Option<Crs>,
    nodata: Option<f64>,
}

impl GridHandle {
    /// Build a grid, checking that `values` holds exactly `width * height` cells.
    pub fn new(
        unit: UnitKey,
        width: usize,
        height: usize,
        values: Vec<f64>,
        transform: GeoTransform,
        crs: Option<Crs>,
        nodata: Option<f64>,
    ) -> Result<Self, DecodeError> {
        let expected = width * height;
        if values.len() != expected {
            return Err(DecodeError::ShapeMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            unit,
            width,
            height,
            values,
            transform,
            crs,
            nodata,
        })
    }

    pub fn unit(&self) -> &UnitKey {
        &self.unit
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(height, width)`, matching array shape order.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<Crs> {
        self.crs
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.width, self.height)
    }

    /// Value at `(col, row)`, or `None` when out of range.
    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.values.get(row * self.width + col).copied()
    }

    /// True for the nodata sentinel and for NaN.
    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nd| value == nd)
    }

    /// Sum of every valid (non-nodata) cell.
    pub fn valid_sum(&self) -> f64 {
        self.values.iter().filter(|v| !self.is_nodata(**v)).sum()
    }

    /// Spatial metadata without the pixel array.
    pub fn metadata(&self) -> RasterMetadata {
        RasterMetadata {
            unit: self.unit.clone(),
            crs: self.crs,
            transform: self.transform,
            width: self.width,
            height: self.height,
            bounds: self.bounds(),
            nodata: self.nodata,
        }
    }
}

/// Raster spatial metadata, read without decoding pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterMetadata {
    pub unit: UnitKey,
    pub crs: Option<Crs>,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    pub bounds: BoundingBox,
    pub nodata: Option<f64>,
}

/// Errors raised while decoding a GeoTIFF payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The TIFF container itself could not be read
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Sample layout is not a plain numeric band
    #[error("Unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    /// No usable affine georeference tags
    #[error("Raster has no usable georeference (ModelTransformation or ModelTiepoint + ModelPixelScale)")]
    MissingGeoreference,

    /// Pixel buffer does not match the declared dimensions
    #[error("Pixel buffer holds {actual} cells, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
}

/// A per-unit acquisition failure.
///
/// Always carries the unit it belongs to so batch callers can attribute it.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("Failed to download {unit}: {source}")]
    Download {
        unit: UnitKey,
        #[source]
        source: SourceError,
    },

    #[error("Failed to decode {unit}: {source}")]
    Decode {
        unit: UnitKey,
        #[source]
        source: DecodeError,
    },
}

impl AcquireError {
    pub fn unit(&self) -> &UnitKey {
        match self {
            AcquireError::Download { unit, .. } | AcquireError::Decode { unit, .. } => unit,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            AcquireError::Download { .. } => FailureKind::DownloadFailure,
            AcquireError::Decode { .. } => FailureKind::DecodeFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demography::{AgeBand, CountryCode, Sex};

    fn unit() -> UnitKey {
        UnitKey::new(CountryCode::new("KEN").unwrap(), Sex::Male, AgeBand::from_raw("0_4"))
    }

    #[test]
    fn test_cell_center_north_up() {
        let t = GeoTransform::from_origin(30.0, 5.0, 0.5, 0.5);
        assert_eq!(t.cell_center(0, 0), (30.25, 4.75));
        assert_eq!(t.cell_center(2, 1), (31.25, 4.25));
    }

    #[test]
    fn test_inverse_round_trips_corner() {
        let t = GeoTransform::from_origin(30.0, 5.0, 0.5, 0.25);
        let inv = t.inverse().unwrap();
        let (x, y) = t.apply(3.0, 7.0);
        let (col, row) = inv.apply(x, y);
        assert!((col - 3.0).abs() < 1e-9);
        assert!((row - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_singular_transform_has_no_inverse() {
        let t = GeoTransform::from_origin(0.0, 0.0, 0.0, 1.0);
        assert!(t.inverse().is_none());
    }

    #[test]
    fn test_bounds_north_up() {
        let t = GeoTransform::from_origin(30.0, 5.0, 0.5, 0.5);
        let b = t.bounds(4, 2);
        assert_eq!(b, BoundingBox { left: 30.0, bottom: 4.0, right: 32.0, top: 5.0 });
    }

    #[test]
    fn test_grid_rejects_wrong_shape() {
        let t = GeoTransform::from_origin(0.0, 1.0, 0.1, 0.1);
        let err = GridHandle::new(unit(), 3, 3, vec![0.0; 8], t, None, None).unwrap_err();
        assert!(matches!(err, DecodeError::ShapeMismatch { expected: 9, actual: 8 }));
    }

    #[test]
    fn test_valid_sum_excludes_nodata_and_nan() {
        let t = GeoTransform::from_origin(0.0, 1.0, 0.5, 0.5);
        let grid = GridHandle::new(
            unit(),
            2,
            2,
            vec![1.0, -99999.0, f64::NAN, 2.5],
            t,
            Some(Crs::WGS84),
            Some(-99999.0),
        )
        .unwrap();
        assert_eq!(grid.valid_sum(), 3.5);
        assert_eq!(grid.get(1, 1), Some(2.5));
        assert_eq!(grid.get(2, 0), None);
        assert_eq!(grid.shape(), (2, 2));
    }

    #[test]
    fn test_acquire_error_kind_and_unit() {
        let err = AcquireError::Decode {
            unit: unit(),
            source: DecodeError::MissingGeoreference,
        };
        assert_eq!(err.kind(), FailureKind::DecodeFailure);
        assert_eq!(err.unit().identifier(), "KEN_M_0_4");
    }
}

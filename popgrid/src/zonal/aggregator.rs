//! Zonal aggregator: sums grid cells inside each district polygon.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use super::table::CombinedTable;
use super::types::{AggregateError, DistrictCell, SkippedDistrict, ZonalSummary};
use crate::boundary::{BoundaryRegistry, DistrictBoundary, GeometryError};
use crate::demography::CountryCode;
use crate::raster::{AcquireError, BatchResults, BoundingBox, Crs, GeoTransform, GridHandle};

/// Computes per-district population sums for decoded grids.
///
/// Boundaries come from a shared read-only [`BoundaryRegistry`]. When a grid
/// uses a different coordinate reference than the boundaries, the reprojected
/// set is built once per `(country, crs)` and reused for later grids.
pub struct ZonalAggregator {
    registry: Arc<BoundaryRegistry>,
    reprojected: DashMap<(CountryCode, Crs), Arc<[DistrictBoundary]>>,
}

impl ZonalAggregator {
    pub fn new(registry: Arc<BoundaryRegistry>) -> Self {
        Self {
            registry,
            reprojected: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &BoundaryRegistry {
        &self.registry
    }

    /// Sum `grid` inside every district of `country`.
    ///
    /// A district with unusable geometry is recorded in
    /// [`ZonalSummary::skipped`] and the rest are still processed. A district
    /// with no valid cells gets population 0 and pixel count 0.
    pub fn aggregate(
        &self,
        grid: &GridHandle,
        country: &CountryCode,
    ) -> Result<ZonalSummary, AggregateError> {
        let unit = grid.unit();
        let Some(boundaries) = self.registry.shared(country).filter(|set| !set.is_empty()) else {
            error!(country = %country, unit = %unit, "No admin boundaries loaded for {}", country);
            return Err(AggregateError::MissingBoundaries {
                country: country.clone(),
            });
        };

        let crs = grid.crs().ok_or_else(|| AggregateError::MissingCrs { unit: unit.clone() })?;
        let boundaries = self.aligned(country, boundaries, crs).map_err(|source| {
            AggregateError::Reprojection {
                unit: unit.clone(),
                source,
            }
        })?;

        let inverse = grid
            .transform()
            .inverse()
            .ok_or_else(|| AggregateError::SingularTransform { unit: unit.clone() })?;

        let mut summary = ZonalSummary::default();
        for district in boundaries.iter() {
            match district_sum(grid, &inverse, district) {
                Ok((population, pixel_count)) => summary.cells.push(DistrictCell {
                    country: unit.country.clone(),
                    sex: unit.sex,
                    age_band: unit.age_band.clone(),
                    district_id: district.district_id.clone(),
                    district: district.district.clone(),
                    region: district.region.clone(),
                    population,
                    pixel_count,
                }),
                Err(e) => {
                    warn!(
                        unit = %unit,
                        district = %district.district,
                        error = %e,
                        "Failed to process district {}",
                        district.district
                    );
                    summary.skipped.push(SkippedDistrict {
                        unit: unit.clone(),
                        district_id: district.district_id.clone(),
                        district: district.district.clone(),
                        error: e,
                    });
                }
            }
        }

        debug!(
            unit = %unit,
            districts = summary.cells.len(),
            skipped = summary.skipped.len(),
            population = summary.total_population(),
            "Aggregated raster"
        );
        Ok(summary)
    }

    /// Aggregate every successfully loaded grid; failed loads are skipped.
    pub fn batch_aggregate(
        &self,
        grids: &BatchResults<Result<GridHandle, AcquireError>>,
    ) -> BatchResults<Result<ZonalSummary, AggregateError>> {
        let mut results = BatchResults::new();
        for (unit, loaded) in grids.iter() {
            match loaded {
                Ok(grid) => {
                    info!(unit = %unit, "Summarizing {}", unit);
                    results.push(unit.clone(), self.aggregate(grid, &unit.country));
                }
                Err(e) => warn!(unit = %unit, error = %e, "Skipping {} - no data", unit),
            }
        }
        results
    }

    /// Flatten successful aggregations into a [`CombinedTable`].
    pub fn combine(summaries: &BatchResults<Result<ZonalSummary, AggregateError>>) -> CombinedTable {
        CombinedTable::combine(summaries.successes().map(|(_, summary)| summary))
    }

    /// Boundaries expressed in `crs`, reprojecting and memoizing on first use.
    fn aligned(
        &self,
        country: &CountryCode,
        boundaries: Arc<[DistrictBoundary]>,
        crs: Crs,
    ) -> Result<Arc<[DistrictBoundary]>, GeometryError> {
        if boundaries.iter().all(|district| district.crs == crs) {
            return Ok(boundaries);
        }

        let key = (country.clone(), crs);
        if let Some(cached) = self.reprojected.get(&key) {
            return Ok(Arc::clone(cached.value()));
        }

        let mut aligned = Vec::with_capacity(boundaries.len());
        for district in boundaries.iter() {
            if district.geometry.validate().is_err() {
                // Left as-is; the per-district pass reports it.
                aligned.push(district.clone());
                continue;
            }
            aligned.push(district.reprojected(crs)?);
        }

        info!(country = %country, crs = %crs, districts = aligned.len(), "Reprojected boundaries");
        let aligned: Arc<[DistrictBoundary]> = Arc::from(aligned);
        self.reprojected.insert(key, Arc::clone(&aligned));
        Ok(aligned)
    }
}

/// Sum of valid cells whose centers fall inside `district`, with their count.
fn district_sum(
    grid: &GridHandle,
    inverse: &GeoTransform,
    district: &DistrictBoundary,
) -> Result<(f64, usize), GeometryError> {
    district.geometry.validate()?;
    let bbox = district
        .geometry
        .bbox()
        .ok_or_else(|| GeometryError::Degenerate("empty geometry".to_string()))?;

    let Some((cols, rows)) = pixel_window(grid, inverse, &bbox) else {
        return Ok((0.0, 0));
    };

    let transform = grid.transform();
    let mut population = 0.0;
    let mut pixel_count = 0;

    for row in rows {
        for col in cols.clone() {
            let (x, y) = transform.cell_center(col, row);
            if !bbox.contains(x, y) || !district.geometry.contains(x, y) {
                continue;
            }
            if let Some(value) = grid.get(col, row) {
                if !grid.is_nodata(value) {
                    population += value;
                    pixel_count += 1;
                }
            }
        }
    }

    Ok((population, pixel_count))
}

/// Column and row ranges of grid cells that can have their center inside `bbox`.
fn pixel_window(
    grid: &GridHandle,
    inverse: &GeoTransform,
    bbox: &BoundingBox,
) -> Option<(std::ops::Range<usize>, std::ops::Range<usize>)> {
    let corners = [
        inverse.apply(bbox.left, bbox.bottom),
        inverse.apply(bbox.left, bbox.top),
        inverse.apply(bbox.right, bbox.bottom),
        inverse.apply(bbox.right, bbox.top),
    ];
    let window = BoundingBox::from_points(corners)?;
    if ![window.left, window.right, window.bottom, window.top]
        .iter()
        .all(|v| v.is_finite())
    {
        return None;
    }

    let clamp = |value: f64, max: usize| value.max(0.0).min(max as f64) as usize;
    let cols = clamp(window.left.floor(), grid.width())..clamp(window.right.ceil(), grid.width());
    let rows = clamp(window.bottom.floor(), grid.height())..clamp(window.top.ceil(), grid.height());

    if cols.is_empty() || rows.is_empty() {
        return None;
    }
    Some((cols, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{MultiPolygon, Polygon};
    use crate::demography::{AgeBand, Sex, UnitKey};
    use crate::pipeline::FailureKind;
    use proptest::prelude::*;

    fn ken() -> CountryCode {
        CountryCode::new("KEN").unwrap()
    }

    fn unit() -> UnitKey {
        UnitKey::new(ken(), Sex::Male, AgeBand::from_raw("0_4"))
    }

    fn district(id: &str, polygon: Polygon, crs: Crs) -> DistrictBoundary {
        DistrictBoundary {
            district_id: id.to_string(),
            district: format!("District {}", id),
            region: "Region".to_string(),
            geometry: MultiPolygon::from(polygon),
            crs,
        }
    }

    /// 10×10 grid over [0,1]², pixel 0.1; a 3×3 block of 100 and one of 200.
    fn two_block_grid(nodata: Option<f64>) -> GridHandle {
        let mut values = vec![0.0; 100];
        for row in 2..5 {
            for col in 2..5 {
                values[row * 10 + col] = 100.0;
            }
        }
        for row in 6..9 {
            for col in 6..9 {
                values[row * 10 + col] = 200.0;
            }
        }
        GridHandle::new(
            unit(),
            10,
            10,
            values,
            GeoTransform::from_origin(0.0, 1.0, 0.1, 0.1),
            Some(Crs::WGS84),
            nodata,
        )
        .unwrap()
    }

    fn two_district_registry() -> Arc<BoundaryRegistry> {
        Arc::new(BoundaryRegistry::from_sets([(
            ken(),
            vec![
                district("A", Polygon::rectangle(0.2, 0.5, 0.5, 0.8), Crs::WGS84),
                district("B", Polygon::rectangle(0.6, 0.1, 0.9, 0.4), Crs::WGS84),
            ],
        )]))
    }

    #[test]
    fn test_two_districts_two_blocks() {
        let aggregator = ZonalAggregator::new(two_district_registry());

        let summary = aggregator.aggregate(&two_block_grid(None), &ken()).unwrap();

        assert_eq!(summary.cells.len(), 2);
        assert_eq!(summary.cells[0].district_id, "A");
        assert_eq!(summary.cells[0].population, 900.0);
        assert_eq!(summary.cells[0].pixel_count, 9);
        assert_eq!(summary.cells[1].population, 1800.0);
        assert!(summary.skipped.is_empty());
    }

    #[test]
    fn test_nodata_cells_are_excluded() {
        let mut values = vec![5.0; 4];
        values[1] = -1.0;
        let grid = GridHandle::new(
            unit(),
            2,
            2,
            values,
            GeoTransform::from_origin(0.0, 2.0, 1.0, 1.0),
            Some(Crs::WGS84),
            Some(-1.0),
        )
        .unwrap();
        let registry = Arc::new(BoundaryRegistry::from_sets([(
            ken(),
            vec![district("ALL", Polygon::rectangle(0.0, 0.0, 2.0, 2.0), Crs::WGS84)],
        )]));

        let summary = ZonalAggregator::new(registry).aggregate(&grid, &ken()).unwrap();

        assert_eq!(summary.cells[0].population, 15.0);
        assert_eq!(summary.cells[0].pixel_count, 3);
    }

    #[test]
    fn test_district_outside_grid_has_zero_population() {
        let registry = Arc::new(BoundaryRegistry::from_sets([(
            ken(),
            vec![district("FAR", Polygon::rectangle(5.0, 5.0, 6.0, 6.0), Crs::WGS84)],
        )]));

        let summary = ZonalAggregator::new(registry)
            .aggregate(&two_block_grid(None), &ken())
            .unwrap();

        assert_eq!(summary.cells[0].population, 0.0);
        assert_eq!(summary.cells[0].pixel_count, 0);
    }

    #[test]
    fn test_degenerate_district_is_skipped_not_fatal() {
        let registry = Arc::new(BoundaryRegistry::from_sets([(
            ken(),
            vec![
                district("BAD", Polygon::rectangle(0.2, 0.5, 0.2, 0.8), Crs::WGS84),
                district("B", Polygon::rectangle(0.6, 0.1, 0.9, 0.4), Crs::WGS84),
            ],
        )]));

        let summary = ZonalAggregator::new(registry)
            .aggregate(&two_block_grid(None), &ken())
            .unwrap();

        assert_eq!(summary.cells.len(), 1);
        assert_eq!(summary.cells[0].population, 1800.0);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].district_id, "BAD");
        assert_eq!(summary.skipped[0].error.kind(), FailureKind::GeometryFailure);
    }

    #[test]
    fn test_missing_boundaries_is_unit_error() {
        let aggregator = ZonalAggregator::new(Arc::new(BoundaryRegistry::default()));
        let err = aggregator.aggregate(&two_block_grid(None), &ken()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::MissingBoundaries);
    }

    #[test]
    fn test_missing_grid_crs_is_unit_error() {
        let base = two_block_grid(None);
        let grid = GridHandle::new(unit(), 10, 10, base.values().to_vec(), *base.transform(), None, None)
            .unwrap();

        let err = ZonalAggregator::new(two_district_registry())
            .aggregate(&grid, &ken())
            .unwrap_err();
        assert!(matches!(err, AggregateError::MissingCrs { .. }));
    }

    #[test]
    fn test_boundaries_reprojected_to_grid_crs() {
        // Grid in Web Mercator covering lon/lat [0, 1]².
        let (x0, y0) = Crs::WGS84.transform_point(Crs::WEB_MERCATOR, 0.0, 0.0).unwrap();
        let (x1, y1) = Crs::WGS84.transform_point(Crs::WEB_MERCATOR, 1.0, 1.0).unwrap();
        let grid = GridHandle::new(
            unit(),
            2,
            2,
            vec![1.0, 2.0, 3.0, 4.0],
            GeoTransform::from_origin(x0, y1, (x1 - x0) / 2.0, (y1 - y0) / 2.0),
            Some(Crs::WEB_MERCATOR),
            None,
        )
        .unwrap();
        let registry = Arc::new(BoundaryRegistry::from_sets([(
            ken(),
            vec![district("W", Polygon::rectangle(0.0, 0.0, 0.5, 1.0), Crs::WGS84)],
        )]));
        let aggregator = ZonalAggregator::new(registry);

        let summary = aggregator.aggregate(&grid, &ken()).unwrap();

        // Western column: rows 0 and 1 hold 1.0 and 3.0.
        assert_eq!(summary.cells[0].population, 4.0);
        assert_eq!(aggregator.reprojected.len(), 1);

        aggregator.aggregate(&grid, &ken()).unwrap();
        assert_eq!(aggregator.reprojected.len(), 1);
    }

    #[test]
    fn test_unsupported_reprojection_fails_unit() {
        let base = two_block_grid(None);
        let grid = GridHandle::new(
            unit(),
            10,
            10,
            base.values().to_vec(),
            *base.transform(),
            Some(Crs::from_epsg(32737)),
            None,
        )
        .unwrap();

        let err = ZonalAggregator::new(two_district_registry())
            .aggregate(&grid, &ken())
            .unwrap_err();
        assert!(matches!(
            err,
            AggregateError::Reprojection {
                source: GeometryError::UnsupportedReprojection { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_batch_aggregate_skips_failed_loads() {
        let failed = UnitKey::new(ken(), Sex::Female, AgeBand::from_raw("0_4"));
        let mut grids = BatchResults::new();
        grids.push(unit(), Ok(two_block_grid(None)));
        grids.push(
            failed.clone(),
            Err(AcquireError::Decode {
                unit: failed.clone(),
                source: crate::raster::DecodeError::MissingGeoreference,
            }),
        );
        let aggregator = ZonalAggregator::new(two_district_registry());

        let summaries = aggregator.batch_aggregate(&grids);
        let table = ZonalAggregator::combine(&summaries);

        assert_eq!(summaries.len(), 1);
        assert!(summaries.get(&failed).is_none());
        assert_eq!(table.len(), 2);
        assert_eq!(table.total_population(), 2700.0);
    }

    fn arb_grid() -> impl Strategy<Value = (usize, usize, Vec<f64>)> {
        (2usize..8, 1usize..6).prop_flat_map(|(width, height)| {
            let cell = prop_oneof![4 => 0.0f64..1000.0, 1 => Just(-1.0)];
            (Just(width), Just(height), prop::collection::vec(cell, width * height))
        })
    }

    proptest! {
        /// Property: district sums plus cells outside every district equal the grid's valid sum.
        #[test]
        fn prop_zonal_sums_reconcile(
            (width, height, values) in arb_grid(),
            split in 0.0f64..1.0,
            coverage in 0.0f64..1.0,
        ) {
            let covered = ((width as f64 * coverage).round() as usize).max(1);
            let split_col = ((covered as f64 * split).round() as usize).min(covered);
            let h = height as f64;

            let grid = GridHandle::new(
                unit(),
                width,
                height,
                values.clone(),
                GeoTransform::from_origin(0.0, h, 1.0, 1.0),
                Some(Crs::WGS84),
                Some(-1.0),
            )
            .unwrap();
            let registry = Arc::new(BoundaryRegistry::from_sets([(
                ken(),
                vec![
                    district("A", Polygon::rectangle(0.0, 0.0, split_col as f64, h), Crs::WGS84),
                    district("B", Polygon::rectangle(split_col as f64, 0.0, covered as f64, h), Crs::WGS84),
                ],
            )]));

            let summary = ZonalAggregator::new(registry).aggregate(&grid, &ken()).unwrap();

            let outside: f64 = values
                .iter()
                .enumerate()
                .filter(|(i, v)| i % width >= covered && **v != -1.0)
                .map(|(_, v)| v)
                .sum();
            let total = summary.total_population() + outside;
            prop_assert!((total - grid.valid_sum()).abs() < 1e-6 * (1.0 + grid.valid_sum()));
        }
    }
}

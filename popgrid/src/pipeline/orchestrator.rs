//! Pipeline orchestrator: acquire → aggregate → indicators → artifacts.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{error, info, warn};

use super::output::{ensure_output_dir, write_artifacts};
use super::types::{
    FailureKind, PipelineError, PipelineRunSummary, RasterMetadataRecord, SkippedDistrictRecord,
    SpatialInfo, UnitFailure,
};
use crate::boundary::BoundaryRegistry;
use crate::cache::CacheStore;
use crate::config::ConfigFile;
use crate::demography::{AgeBand, CountryCode, Sex, UnitKey};
use crate::indicators::{compute_indicators, DemographicIndicatorRow};
use crate::raster::{run_units, AcquireError, RasterAcquirer, RasterMetadata};
use crate::source::ReqwestSource;
use crate::zonal::{AggregateError, CombinedTable, ZonalAggregator, ZonalSummary};

/// What a run covers and where it writes.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub countries: Vec<CountryCode>,
    pub age_bands: Vec<AgeBand>,
    pub sexes: Vec<Sex>,
    pub use_cache: bool,
    /// Units processed concurrently; 1 processes them strictly in order
    pub workers: usize,
    pub output_dir: PathBuf,
    /// Remove expired cache entries before acquiring anything
    pub sweep_cache_first: bool,
}

impl PipelineOptions {
    /// Options taken straight from the configuration file.
    pub fn from_config(config: &ConfigFile) -> Self {
        Self {
            countries: config.source.countries.clone(),
            age_bands: config.source.age_bands.clone(),
            sexes: config.source.sexes.clone(),
            use_cache: config.cache.enabled,
            workers: config.pipeline.workers,
            output_dir: config.output.directory.clone(),
            sweep_cache_first: config.pipeline.sweep_cache_first,
        }
    }

    /// Every unit of the run, country-major.
    pub fn units(&self) -> Vec<UnitKey> {
        UnitKey::expand(&self.countries, &self.sexes, &self.age_bands)
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub summary: PipelineRunSummary,
    pub table: CombinedTable,
    pub indicators: Vec<DemographicIndicatorRow>,
    pub raster_metadata: Vec<RasterMetadataRecord>,
    /// Paths of the files written
    pub artifacts: Vec<PathBuf>,
}

/// Result of processing one unit.
enum UnitOutcome {
    Aggregated {
        metadata: RasterMetadata,
        summary: ZonalSummary,
    },
    AggregateFailed {
        metadata: RasterMetadata,
        error: AggregateError,
    },
    AcquireFailed(AcquireError),
    NoBoundaries,
}

/// Runs the whole pipeline for a set of units.
///
/// Units are processed one at a time per worker: a grid is acquired,
/// aggregated and dropped before the worker moves on, so at most one decoded
/// grid per worker is resident. A unit's failure is recorded and never stops
/// the run. Only failing to write the artifacts is fatal.
pub struct PipelineOrchestrator {
    acquirer: RasterAcquirer,
    aggregator: ZonalAggregator,
    options: PipelineOptions,
}

impl PipelineOrchestrator {
    pub fn new(acquirer: RasterAcquirer, aggregator: ZonalAggregator, options: PipelineOptions) -> Self {
        Self {
            acquirer,
            aggregator,
            options,
        }
    }

    /// Wire the HTTP source, cache and boundary registry described by `config`.
    pub fn from_config(config: &ConfigFile, options: PipelineOptions) -> Result<Self, PipelineError> {
        let source = ReqwestSource::with_options(
            Duration::from_secs(config.download.timeout),
            config.download.chunk_size,
        )
        .map_err(|e| PipelineError::Config(e.to_string()))?;

        let mut acquirer = RasterAcquirer::new(config.source.base_url.clone(), Arc::new(source))
            .with_workers(options.workers);
        if config.cache.enabled {
            match CacheStore::new(config.cache.directory.clone(), config.cache.max_age) {
                Ok(cache) => acquirer = acquirer.with_cache(Arc::new(cache)),
                Err(e) => warn!(
                    directory = %config.cache.directory.display(),
                    error = %e,
                    kind = %e.kind(),
                    "Cache unavailable, downloading without it"
                ),
            }
        }

        let files: Vec<(CountryCode, PathBuf)> = options
            .countries
            .iter()
            .map(|country| (country.clone(), config.boundaries.file_for(country)))
            .collect();
        let registry = BoundaryRegistry::load(&files, &config.boundaries.fields());
        let aggregator = ZonalAggregator::new(Arc::new(registry));

        Ok(Self::new(acquirer, aggregator, options))
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn acquirer(&self) -> &RasterAcquirer {
        &self.acquirer
    }

    pub fn aggregator(&self) -> &ZonalAggregator {
        &self.aggregator
    }

    /// Execute the run and persist its artifacts.
    pub fn run(&self) -> Result<PipelineReport, PipelineError> {
        let started = Instant::now();
        let started_at = Utc::now();
        let options = &self.options;

        ensure_output_dir(&options.output_dir)?;

        if options.use_cache && options.sweep_cache_first {
            if let Some(cache) = self.acquirer.cache() {
                let swept = cache.sweep(cache.max_age());
                info!(
                    removed = swept.entries_removed,
                    orphans = swept.orphans_removed,
                    bytes_freed = swept.bytes_freed,
                    "Swept expired cache entries"
                );
            }
        }

        for country in &options.countries {
            if self.aggregator.registry().boundaries_for(country).is_empty() {
                error!(country = %country, "No admin boundaries loaded for {}, skipping its rasters", country);
            }
        }

        let units = options.units();
        info!(
            units = units.len(),
            countries = options.countries.len(),
            workers = options.workers,
            "Starting population pipeline"
        );
        let outcomes = run_units(&units, options.workers, |unit| self.process_unit(unit));

        let mut table = CombinedTable::new();
        let mut raster_metadata = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        let mut skipped_districts = Vec::new();
        let mut spatial_info = BTreeMap::new();
        let mut total_rasters = 0;

        for (unit, outcome) in outcomes {
            match outcome {
                UnitOutcome::Aggregated { metadata, summary } => {
                    total_rasters += 1;
                    raster_metadata.push(RasterMetadataRecord::loaded(&metadata));
                    spatial_info
                        .entry(unit.country.clone())
                        .or_insert_with(|| SpatialInfo::from(&metadata));
                    skipped_districts.extend(summary.skipped.iter().map(SkippedDistrictRecord::from));
                    table.extend(summary.cells);
                }
                UnitOutcome::AggregateFailed { metadata, error } => {
                    total_rasters += 1;
                    raster_metadata.push(RasterMetadataRecord::loaded(&metadata));
                    spatial_info
                        .entry(unit.country.clone())
                        .or_insert_with(|| SpatialInfo::from(&metadata));
                    failures.push(UnitFailure::new(&unit, error.kind(), &error));
                }
                UnitOutcome::AcquireFailed(error) => {
                    raster_metadata.push(RasterMetadataRecord::missing(&unit));
                    failures.push(UnitFailure::new(&unit, error.kind(), &error));
                }
                UnitOutcome::NoBoundaries => {
                    raster_metadata.push(RasterMetadataRecord::missing(&unit));
                    failures.push(UnitFailure::new(
                        &unit,
                        FailureKind::MissingBoundaries,
                        format!("No admin boundaries loaded for {}", unit.country),
                    ));
                }
            }
        }

        let indicators = compute_indicators(&table);
        let summary = PipelineRunSummary {
            started_at,
            countries: options.countries.clone(),
            sexes: options.sexes.clone(),
            age_groups: options.age_bands.clone(),
            total_rasters,
            failed_rasters: failures.iter().map(|f| f.identifier.clone()).collect(),
            failures,
            skipped_districts,
            spatial_info,
            execution_time: started.elapsed().as_secs_f64(),
        };

        let artifacts = write_artifacts(
            &options.output_dir,
            &table,
            &indicators,
            &raster_metadata,
            &summary,
        )?;

        info!(
            rasters = summary.total_rasters,
            failed = summary.failed_rasters.len(),
            rows = table.len(),
            districts = indicators.len(),
            seconds = summary.execution_time,
            "Pipeline complete"
        );

        Ok(PipelineReport {
            summary,
            table,
            indicators,
            raster_metadata,
            artifacts,
        })
    }

    fn process_unit(&self, unit: &UnitKey) -> UnitOutcome {
        if self.aggregator.registry().boundaries_for(&unit.country).is_empty() {
            return UnitOutcome::NoBoundaries;
        }

        let grid = match self.acquirer.load(unit, self.options.use_cache) {
            Ok(grid) => grid,
            Err(error) => {
                warn!(unit = %unit, kind = %error.kind(), error = %error, "Skipping {} - no data", unit);
                return UnitOutcome::AcquireFailed(error);
            }
        };

        let metadata = grid.metadata();
        match self.aggregator.aggregate(&grid, &unit.country) {
            Ok(summary) => {
                info!(
                    unit = %unit,
                    districts = summary.cells.len(),
                    population = summary.total_population(),
                    "Summarized {}",
                    unit
                );
                UnitOutcome::Aggregated { metadata, summary }
            }
            Err(error) => {
                warn!(unit = %unit, kind = %error.kind(), error = %error, "Failed to aggregate {}", unit);
                UnitOutcome::AggregateFailed { metadata, error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{DistrictBoundary, MultiPolygon, Polygon};
    use crate::raster::decode::tests::encode_geotiff;
    use crate::raster::{resolve_url, Crs};
    use crate::source::MockSource;
    use tempfile::TempDir;

    const BASE: &str = "https://example.org/pop";

    fn ken() -> CountryCode {
        CountryCode::new("KEN").unwrap()
    }

    fn district(id: &str, name: &str, l: f64, b: f64, r: f64, t: f64) -> DistrictBoundary {
        DistrictBoundary {
            district_id: id.to_string(),
            district: name.to_string(),
            region: "Nairobi".to_string(),
            geometry: MultiPolygon::from(Polygon::rectangle(l, b, r, t)),
            crs: Crs::WGS84,
        }
    }

    /// 6×3 grid: left 3×3 block at 100, right 3×3 block at 200.
    fn grid_bytes() -> Vec<u8> {
        let mut values = Vec::new();
        for _ in 0..3 {
            values.extend([100.0; 3]);
            values.extend([200.0; 3]);
        }
        encode_geotiff(6, 3, &values, (0.0, 3.0), 1.0, None)
    }

    fn options(output: &TempDir, bands: &[&str]) -> PipelineOptions {
        PipelineOptions {
            countries: vec![ken()],
            age_bands: bands.iter().map(|b| AgeBand::from_raw(*b)).collect(),
            sexes: Sex::ALL.to_vec(),
            use_cache: false,
            workers: 1,
            output_dir: output.path().join("outputs"),
            sweep_cache_first: false,
        }
    }

    fn orchestrator(source: MockSource, options: PipelineOptions) -> PipelineOrchestrator {
        let registry = BoundaryRegistry::from_sets([(
            ken(),
            vec![
                district("KEN.1_1", "Westlands", 0.0, 0.0, 3.0, 3.0),
                district("KEN.1_2", "Kibra", 3.0, 0.0, 6.0, 3.0),
            ],
        )]);
        PipelineOrchestrator::new(
            RasterAcquirer::new(BASE, Arc::new(source)),
            ZonalAggregator::new(Arc::new(registry)),
            options,
        )
    }

    fn url(sex: Sex, band: &str) -> String {
        resolve_url(BASE, &UnitKey::new(ken(), sex, AgeBand::from_raw(band)))
    }

    #[test]
    fn test_run_aggregates_and_writes_artifacts() {
        let output = TempDir::new().unwrap();
        let source = MockSource::default()
            .with_body(&url(Sex::Male, "0_4"), grid_bytes())
            .with_body(&url(Sex::Female, "0_4"), grid_bytes());

        let report = orchestrator(source, options(&output, &["0_4"])).run().unwrap();

        assert_eq!(report.summary.total_rasters, 2);
        assert!(report.summary.failed_rasters.is_empty());
        assert_eq!(report.table.len(), 4);
        assert_eq!(report.table.cells()[0].population, 900.0);
        assert_eq!(report.table.cells()[1].population, 1800.0);
        assert_eq!(report.indicators.len(), 2);
        assert_eq!(report.artifacts.len(), 5);
        for path in &report.artifacts {
            assert!(path.exists(), "{} missing", path.display());
        }

        let info = &report.summary.spatial_info[&ken()];
        assert_eq!(info.shape, (3, 6));
        assert_eq!(info.crs, Some(Crs::WGS84));
    }

    #[test]
    fn test_failed_unit_is_recorded_not_raised() {
        let output = TempDir::new().unwrap();
        let source = MockSource::default()
            .with_body(&url(Sex::Male, "0_4"), grid_bytes())
            .with_failure(&url(Sex::Female, "0_4"), 500);

        let report = orchestrator(source, options(&output, &["0_4"])).run().unwrap();

        assert_eq!(report.summary.total_rasters, 1);
        assert_eq!(report.summary.failed_rasters, vec!["KEN_F_0_4".to_string()]);
        assert_eq!(report.summary.failures[0].kind, FailureKind::DownloadFailure);
        assert_eq!(report.table.len(), 2);

        let loaded: Vec<bool> = report.raster_metadata.iter().map(|r| r.data_loaded).collect();
        assert_eq!(loaded, vec![true, false]);
    }

    #[test]
    fn test_undecodable_payload_is_decode_failure() {
        let output = TempDir::new().unwrap();
        let source = MockSource::default()
            .with_body(&url(Sex::Male, "0_4"), b"not a tiff".to_vec())
            .with_body(&url(Sex::Female, "0_4"), grid_bytes());

        let report = orchestrator(source, options(&output, &["0_4"])).run().unwrap();

        assert_eq!(report.summary.failures.len(), 1);
        assert_eq!(report.summary.failures[0].identifier, "KEN_M_0_4");
        assert_eq!(report.summary.failures[0].kind, FailureKind::DecodeFailure);
    }

    #[test]
    fn test_country_without_boundaries_skips_acquisition() {
        let output = TempDir::new().unwrap();
        let uga = CountryCode::new("UGA").unwrap();
        let mut opts = options(&output, &["0_4"]);
        opts.countries.push(uga.clone());
        let source = MockSource::default()
            .with_body(&url(Sex::Male, "0_4"), grid_bytes())
            .with_body(&url(Sex::Female, "0_4"), grid_bytes());
        let source = Arc::new(source);
        let registry = BoundaryRegistry::from_sets([(
            ken(),
            vec![district("KEN.1_1", "Westlands", 0.0, 0.0, 3.0, 3.0)],
        )]);
        let orchestrator = PipelineOrchestrator::new(
            RasterAcquirer::new(BASE, source.clone()),
            ZonalAggregator::new(Arc::new(registry)),
            opts,
        );

        let report = orchestrator.run().unwrap();

        assert_eq!(source.call_count(), 2);
        assert_eq!(report.summary.total_rasters, 2);
        assert_eq!(report.summary.failed_rasters, vec!["UGA_M_0_4", "UGA_F_0_4"]);
        assert!(report
            .summary
            .failures
            .iter()
            .all(|f| f.kind == FailureKind::MissingBoundaries));
        assert!(!report.summary.spatial_info.contains_key(&uga));
    }

    #[test]
    fn test_parallel_run_matches_sequential() {
        let bands = ["0_4", "5_9", "15_19"];
        let source = || {
            let mut source = MockSource::default();
            for sex in Sex::ALL {
                for band in bands {
                    source = source.with_body(&url(sex, band), grid_bytes());
                }
            }
            source
        };

        let sequential_dir = TempDir::new().unwrap();
        let sequential = orchestrator(source(), options(&sequential_dir, &bands)).run().unwrap();

        let parallel_dir = TempDir::new().unwrap();
        let mut parallel_options = options(&parallel_dir, &bands);
        parallel_options.workers = 4;
        let parallel = orchestrator(source(), parallel_options).run().unwrap();

        assert_eq!(sequential.table, parallel.table);
        assert_eq!(sequential.indicators, parallel.indicators);
    }

    #[test]
    fn test_unwritable_output_is_fatal() {
        let output = TempDir::new().unwrap();
        let blocker = output.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let mut opts = options(&output, &["0_4"]);
        opts.output_dir = blocker.join("outputs");

        let result = orchestrator(MockSource::default(), opts).run();
        assert!(matches!(result, Err(PipelineError::Output { .. })));
    }
}

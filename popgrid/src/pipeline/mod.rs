//! Pipeline orchestration and run artifacts.
//!
//! The orchestrator sequences the stages for every
//! (country, sex, age band) unit:
//!
//! ```text
//! RasterAcquirer → ZonalAggregator → CombinedTable → indicators → CSV / JSON
//! ```
//!
//! A unit that fails to download, decode or aggregate is recorded in the
//! [`PipelineRunSummary`] with its [`FailureKind`] and the run carries on.
//! Only failing to persist the artifacts aborts a run.
//!
//! # Example
//!
//! ```ignore
//! use popgrid::config::ConfigFile;
//! use popgrid::pipeline::{PipelineOptions, PipelineOrchestrator};
//!
//! let config = ConfigFile::load()?;
//! let options = PipelineOptions::from_config(&config);
//! let report = PipelineOrchestrator::from_config(&config, options)?.run()?;
//! println!("{} rasters loaded", report.summary.total_rasters);
//! ```

mod orchestrator;
pub mod output;
mod types;

pub use orchestrator::{PipelineOptions, PipelineOrchestrator, PipelineReport};
pub use output::{
    write_artifacts, COMBINED_TABLE_FILE, INDICATORS_FILE, RASTER_METADATA_FILE,
    RUN_SUMMARY_FILE, TIDY_TABLE_FILE,
};
pub use types::{
    FailureKind, PipelineError, PipelineRunSummary, RasterMetadataRecord, SkippedDistrictRecord,
    SpatialInfo, UnitFailure,
};

//! popgrid - district-level population estimates from gridded rasters
//!
//! This library downloads age/sex population rasters (WorldPop-style
//! GeoTIFFs, one per country × sex × age band), sums them inside
//! administrative district boundaries, and derives demographic indicators.
//!
//! # High-Level API
//!
//! For most use cases, the [`pipeline`] module runs everything from a
//! configuration file:
//!
//! ```ignore
//! use popgrid::config::ConfigFile;
//! use popgrid::pipeline::{PipelineOptions, PipelineOrchestrator};
//!
//! let config = ConfigFile::load()?;
//! let options = PipelineOptions::from_config(&config);
//! let report = PipelineOrchestrator::from_config(&config, options)?.run()?;
//! ```
//!
//! # Modules
//!
//! - [`demography`] - countries, sexes, age bands and unit keys
//! - [`cache`] - content-addressed raster cache with expiry
//! - [`source`] - streamed raster downloads
//! - [`raster`] - acquisition, GeoTIFF decoding and batch results
//! - [`boundary`] - district boundary loading and geometry
//! - [`zonal`] - per-district sums and the combined table
//! - [`indicators`] - age structure and sex ratio indicators
//! - [`pipeline`] - orchestration, run summary and artifacts

pub mod boundary;
pub mod cache;
pub mod config;
pub mod demography;
pub mod indicators;
pub mod logging;
pub mod pipeline;
pub mod raster;
pub mod source;
pub mod zonal;

/// Version of the popgrid library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

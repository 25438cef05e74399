//! Configuration for popgrid runs.
//!
//! Settings are read from an INI file (`~/.popgrid/config.ini` by default)
//! and overlaid onto built-in defaults, so a missing file or section simply
//! yields the default behaviour.
//!
//! # Example
//!
//! ```
//! use popgrid::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.pipeline.workers, 1);
//! assert!(config.cache.enabled);
//! ```

mod defaults;
mod duration;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::{
    default_cache_dir, DEFAULT_BASE_URL, DEFAULT_BOUNDARY_DIRECTORY, DEFAULT_BOUNDARY_PATTERN,
    DEFAULT_CACHE_MAX_AGE, DEFAULT_COUNTRIES, DEFAULT_DISTRICT_FIELD, DEFAULT_DOWNLOAD_CHUNK_SIZE,
    DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_ID_FIELD, DEFAULT_LOG_FILE, DEFAULT_OUTPUT_DIRECTORY,
    DEFAULT_REGION_FIELD, DEFAULT_WORKERS,
};
pub use duration::{format_duration, parse_duration, DurationParseError};
pub use file::{
    config_directory, config_file_path, ConfigFileError, InitOutcome, CONFIG_FILE_NAME,
};
pub use settings::{
    BoundarySettings, CacheSettings, ConfigFile, DownloadSettings, LoggingSettings,
    OutputSettings, PipelineSettings, SourceSettings,
};
pub use size::{format_bytes, format_size, parse_size, SizeParseError};

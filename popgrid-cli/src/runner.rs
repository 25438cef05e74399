//! CLI runner for common setup.
//!
//! Encapsulates configuration loading and logging initialization so command
//! handlers start from a ready environment.

use popgrid::config::ConfigFile;
use popgrid::logging::{init_logging, split_log_path, LoggingGuard};
use tracing::info;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Keeps logging active while the runner exists
    _logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Load the config file and initialize logging to its log path.
    ///
    /// * `verbose` - enables debug-level logging unless `RUST_LOG` says otherwise
    pub fn new(verbose: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let (log_dir, log_file) = split_log_path(&config.logging.file);
        let logging_guard = init_logging(&log_dir, &log_file, true, verbose)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!(version = popgrid::VERSION, command = command, "popgrid starting");
    }
}

//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use popgrid::cache::CacheError;
use popgrid::config::ConfigFileError;
use popgrid::pipeline::PipelineError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Invalid command-line argument
    InvalidArgument(String),
    /// Cache operation failed
    Cache(CacheError),
    /// Pipeline run failed
    Pipeline(PipelineError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Check the configuration file (popgrid config path) or recreate it with:");
                eprintln!("  popgrid config init --force");
            }
            CliError::Pipeline(PipelineError::Output { .. }) => {
                eprintln!();
                eprintln!("Make sure the output directory is writable or choose another with --output.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Cache(e) => write!(f, "Cache error: {}", e),
            CliError::Pipeline(e) => write!(f, "Pipeline failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Cache(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Cache(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}

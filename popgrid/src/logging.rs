//! Logging setup for popgrid runs.
//!
//! Provides structured logging with file output and optional console output:
//! - Writes to `logs/popgrid.log` by default (cleared on session start)
//! - Optionally mirrors events to stdout
//! - Level defaults to `info` (`debug` when verbose) and can be overridden
//!   with the `RUST_LOG` environment variable

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default log directory, relative to the working directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "popgrid.log";

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize the global tracing subscriber.
///
/// Creates `log_dir` if needed, truncates the previous log file and installs a
/// non-blocking file layer plus, when `stdout_enabled`, a console layer.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or the log file
/// cannot be cleared.
pub fn init_logging(
    log_dir: &Path,
    log_file: &str,
    stdout_enabled: bool,
    debug: bool,
) -> Result<LoggingGuard, io::Error> {
    prepare_log_file(log_dir, log_file)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = stdout_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .with_ansi(true)
            .with_target(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter(debug))
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Split a configured log path into directory and file name.
///
/// A bare file name logs into the current directory; a path without a file
/// name falls back to [`DEFAULT_LOG_FILE`].
pub fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());
    (dir, file)
}

/// Create the log directory and truncate the log file.
fn prepare_log_file(log_dir: &Path, log_file: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(log_file);
    fs::write(&log_path, "")?;
    Ok(log_path)
}

fn env_filter(debug: bool) -> EnvFilter {
    let default_level = if debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_creates_directory_and_file() {
        let temp = TempDir::new().unwrap();
        let log_dir = temp.path().join("nested").join("logs");

        let path = prepare_log_file(&log_dir, "run.log").unwrap();

        assert!(log_dir.exists());
        assert_eq!(fs::read_to_string(path).unwrap(), "");
    }

    #[test]
    fn test_prepare_clears_existing_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("run.log"), "old log data").unwrap();

        let path = prepare_log_file(temp.path(), "run.log").unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "");
    }

    #[test]
    fn test_split_log_path() {
        assert_eq!(
            split_log_path(Path::new("logs/popgrid.log")),
            (PathBuf::from("logs"), "popgrid.log".to_string())
        );
        assert_eq!(
            split_log_path(Path::new("popgrid.log")),
            (PathBuf::from("."), "popgrid.log".to_string())
        );
        assert_eq!(
            split_log_path(Path::new("/")),
            (PathBuf::from("."), DEFAULT_LOG_FILE.to_string())
        );
    }
}

//! Reading and writing `config.ini`.
//!
//! A missing file is not an error: popgrid runs on built-in defaults until
//! `popgrid config init` writes a commented copy. Saves go through a staging
//! file in the target directory and are renamed into place, so an interrupted
//! save never leaves a truncated config behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use ini::Ini;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use super::settings::ConfigFile;

/// Name of the configuration file inside [`config_directory`].
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file exists but is not valid INI
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    /// The file could not be written
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value failed validation
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// The directory holding the file could not be created
    #[error("Failed to create config directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What [`ConfigFile::init_at`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// A default file was written
    Created,
    /// An existing file was replaced with defaults
    Replaced,
    /// A file already existed and was left alone
    Kept,
}

impl ConfigFile {
    /// Load `~/.popgrid/config.ini`, falling back to defaults when it is absent.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load a configuration file, falling back to defaults when it is absent.
    ///
    /// Every value present in the file is validated; the first bad one fails
    /// the load with [`ConfigFileError::InvalidValue`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.is_file() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = super::parser::parse_ini(&ini)?;
        debug!(
            path = %path.display(),
            countries = config.source.countries.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Save to `~/.popgrid/config.ini`.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Save as a commented INI file, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|source| ConfigFileError::Directory {
            path: parent.to_path_buf(),
            source,
        })?;

        let to_write_error = |source: std::io::Error| ConfigFileError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut staged = NamedTempFile::new_in(parent).map_err(to_write_error)?;
        staged
            .write_all(super::writer::to_config_string(self).as_bytes())
            .and_then(|_| staged.flush())
            .map_err(to_write_error)?;
        staged.persist(path).map_err(|e| to_write_error(e.error))?;
        Ok(())
    }

    /// Write the default configuration to `path`.
    ///
    /// An existing file is only replaced when `force` is set.
    pub fn init_at(path: &Path, force: bool) -> Result<InitOutcome, ConfigFileError> {
        let existed = path.exists();
        if existed && !force {
            return Ok(InitOutcome::Kept);
        }
        Self::default().save_to(path)?;
        Ok(if existed {
            InitOutcome::Replaced
        } else {
            InitOutcome::Created
        })
    }

    /// Write `~/.popgrid/config.ini` with defaults unless it already exists.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        Self::init_at(&path, false)?;
        Ok(path)
    }
}

/// The popgrid configuration directory (`~/.popgrid`).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".popgrid")
}

/// The default configuration file (`~/.popgrid/config.ini`).
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

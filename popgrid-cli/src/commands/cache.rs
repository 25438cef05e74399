//! Cache management CLI commands.

use clap::Subcommand;
use popgrid::cache::CacheStore;
use popgrid::config::{format_bytes, format_duration, parse_duration, ConfigFile};

use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show cache location, entry count and size
    Stats,
    /// Remove expired entries, orphaned files and abandoned downloads
    Sweep {
        /// Maximum entry age (e.g. 24h, 7d); defaults to the configured max_age
        #[arg(long)]
        max_age: Option<String>,
    },
    /// Remove every cached raster
    Clear,
}

/// Run a cache subcommand.
pub fn run(action: CacheAction) -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    let store = CacheStore::new(config.cache.directory.clone(), config.cache.max_age)?;

    match action {
        CacheAction::Stats => {
            println!("Raster cache: {}", store.directory().display());
            println!("  Entries: {}", store.entry_count());
            println!("  Size:    {}", format_bytes(store.total_size()));
            println!("  Max age: {}", format_duration(store.max_age()));
            if !config.cache.enabled {
                println!("  (caching is disabled in config)");
            }
        }
        CacheAction::Sweep { max_age } => {
            let max_age = match max_age {
                Some(value) => parse_duration(&value)
                    .map_err(|e| CliError::InvalidArgument(e.to_string()))?,
                None => store.max_age(),
            };
            println!(
                "Sweeping {} (max age {})",
                store.directory().display(),
                format_duration(max_age)
            );

            let result = store.sweep(max_age);
            println!(
                "Removed {} expired entries, {} orphans, {} partial downloads; freed {}",
                result.entries_removed,
                result.orphans_removed,
                result.partials_removed,
                format_bytes(result.bytes_freed)
            );
            if result.entries_skipped > 0 {
                println!("Left {} entries with unreadable metadata in place", result.entries_skipped);
            }
        }
        CacheAction::Clear => {
            println!("Clearing raster cache at: {}", store.directory().display());
            let result = store.clear()?;
            println!(
                "Deleted {} files, freed {}",
                result.files_deleted,
                format_bytes(result.bytes_freed)
            );
        }
    }

    Ok(())
}

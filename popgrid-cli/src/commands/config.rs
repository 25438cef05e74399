//! Configuration management CLI commands.
//!
//! Provides `config init`, `config path` and `config show`.

use clap::Subcommand;
use popgrid::config::{config_file_path, format_duration, format_size, ConfigFile, InitOutcome};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,

    /// Show the effective configuration (file values over defaults)
    Show,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { force } => run_init(force),
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => run_show(),
    }
}

fn run_init(force: bool) -> Result<(), CliError> {
    let path = config_file_path();

    match ConfigFile::init_at(&path, force)? {
        InitOutcome::Created => println!("Wrote default configuration to {}", path.display()),
        InitOutcome::Replaced => println!("Replaced {} with defaults", path.display()),
        InitOutcome::Kept => {
            println!("Configuration already exists at {}", path.display());
            println!("Use --force to replace it with defaults.");
        }
    }
    Ok(())
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn run_show() -> Result<(), CliError> {
    let path = config_file_path();
    let config = ConfigFile::load()?;

    if path.exists() {
        println!("; {}", path.display());
    } else {
        println!("; {} not found, showing defaults", path.display());
    }
    println!();

    let join = |items: Vec<String>| items.join(", ");

    println!("[source]");
    println!("  base_url = {}", config.source.base_url);
    println!(
        "  countries = {}",
        join(config.source.countries.iter().map(ToString::to_string).collect())
    );
    println!(
        "  age_bands = {}",
        join(config.source.age_bands.iter().map(ToString::to_string).collect())
    );
    println!(
        "  sexes = {}",
        join(config.source.sexes.iter().map(|s| s.code().to_string()).collect())
    );
    println!();

    println!("[countries]");
    for (code, name) in &config.countries {
        println!("  {} = {}", code, name);
    }
    println!();

    println!("[boundaries]");
    println!("  directory = {}", config.boundaries.directory.display());
    println!("  file_pattern = {}", config.boundaries.file_pattern);
    println!("  region_field = {}", config.boundaries.region_field);
    println!("  district_field = {}", config.boundaries.district_field);
    println!("  id_field = {}", config.boundaries.id_field);
    println!();

    println!("[cache]");
    println!("  enabled = {}", config.cache.enabled);
    println!("  directory = {}", config.cache.directory.display());
    println!("  max_age = {}", format_duration(config.cache.max_age));
    println!();

    println!("[download]");
    println!("  timeout = {}", config.download.timeout);
    println!("  chunk_size = {}", format_size(config.download.chunk_size));
    println!();

    println!("[pipeline]");
    println!("  workers = {}", config.pipeline.workers);
    println!("  sweep_cache_first = {}", config.pipeline.sweep_cache_first);
    println!();

    println!("[output]");
    println!("  directory = {}", config.output.directory.display());
    println!();

    println!("[logging]");
    println!("  file = {}", config.logging.file.display());

    Ok(())
}

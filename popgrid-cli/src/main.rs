//! popgrid CLI - Command-line interface
//!
//! This binary provides a command-line interface to the popgrid library.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};

use commands::cache::CacheAction;
use commands::config::ConfigCommands;
use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "popgrid")]
#[command(version, about = "District population estimates from gridded age/sex rasters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, aggregate and summarize population rasters
    Run(RunArgs),

    /// Manage the raster cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Cache { action } => commands::cache::run(action),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "popgrid",
            "run",
            "--countries",
            "KEN,UGA",
            "--age-groups",
            "0_4",
            "--no-cache",
            "--workers",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.countries, vec!["KEN", "UGA"]);
                assert_eq!(args.age_groups, vec!["0_4"]);
                assert!(args.no_cache);
                assert_eq!(args.workers, Some(2));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_cache_sweep() {
        let cli = Cli::try_parse_from(["popgrid", "cache", "sweep", "--max-age", "7d"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cache {
                action: CacheAction::Sweep { max_age: Some(_) }
            }
        ));
    }
}

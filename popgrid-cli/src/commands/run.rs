//! Run command - execute the population pipeline.

use std::path::PathBuf;

use clap::Args;
use popgrid::demography::{AgeBand, CountryCode, Sex};
use popgrid::pipeline::{PipelineOptions, PipelineOrchestrator, PipelineReport};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the run command.
#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Countries to process, comma separated (e.g. KEN,UGA); defaults to config
    #[arg(long, value_delimiter = ',')]
    pub countries: Vec<String>,

    /// Age groups to process, comma separated (e.g. 0_4,80_plus); defaults to config
    #[arg(long = "age-groups", value_delimiter = ',')]
    pub age_groups: Vec<String>,

    /// Sexes to process, comma separated (M,F); defaults to config
    #[arg(long, value_delimiter = ',')]
    pub sexes: Vec<String>,

    /// Always download, ignoring the raster cache
    #[arg(long)]
    pub no_cache: bool,

    /// Units processed concurrently (1 = sequential)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Output directory for CSV tables and run_summary.json
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,
}

/// Run the pipeline and print its summary.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.verbose)?;
    runner.log_startup("run");
    let config = runner.config();

    let options = resolve_options(PipelineOptions::from_config(config), &args, |code| {
        config.countries.contains_key(code)
    })?;

    println!(
        "Processing {} countries x {} sexes x {} age groups",
        options.countries.len(),
        options.sexes.len(),
        options.age_bands.len()
    );

    let orchestrator = PipelineOrchestrator::from_config(config, options)?;
    let report = orchestrator.run()?;
    print_summary(&report);
    Ok(())
}

/// Overlay command-line selections onto the configured options.
fn resolve_options(
    mut options: PipelineOptions,
    args: &RunArgs,
    is_known: impl Fn(&CountryCode) -> bool,
) -> Result<PipelineOptions, CliError> {
    if !args.countries.is_empty() {
        options.countries = parse_all(&args.countries)?;
        if let Some(unknown) = options.countries.iter().find(|c| !is_known(c)) {
            return Err(CliError::InvalidArgument(format!(
                "unknown country '{}' - add it to [countries] in the config file",
                unknown
            )));
        }
    }
    if !args.age_groups.is_empty() {
        options.age_bands = parse_all::<AgeBand>(&args.age_groups)?;
    }
    if !args.sexes.is_empty() {
        options.sexes = parse_all::<Sex>(&args.sexes)?;
    }
    if args.no_cache {
        options.use_cache = false;
    }
    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(CliError::InvalidArgument("--workers must be at least 1".to_string()));
        }
        options.workers = workers;
    }
    if let Some(output) = &args.output {
        options.output_dir = output.clone();
    }
    Ok(options)
}

fn parse_all<T>(values: &[String]) -> Result<Vec<T>, CliError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<T>().map_err(|e| CliError::InvalidArgument(e.to_string())))
        .collect()
}

fn print_summary(report: &PipelineReport) {
    let summary = &report.summary;

    println!();
    println!("Pipeline Summary");
    println!("================");
    println!(
        "Countries:        {}",
        summary
            .countries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Rasters loaded:   {}", summary.total_rasters);
    println!("Failed rasters:   {}", summary.failed_rasters.len());
    println!("District rows:    {}", report.table.len());
    println!("Districts:        {}", report.indicators.len());
    println!("Execution time:   {:.1}s", summary.execution_time);

    if !summary.failures.is_empty() {
        println!();
        println!("Failures:");
        for failure in &summary.failures {
            println!("  {} [{}] {}", failure.identifier, failure.kind, failure.cause);
        }
    }
    if !summary.skipped_districts.is_empty() {
        println!();
        println!("Skipped districts: {}", summary.skipped_districts.len());
    }

    println!();
    println!("Outputs:");
    for path in &report.artifacts {
        println!("  {}", path.display());
    }
}

//! Persistence of run artifacts (CSV tables and the JSON run summary).

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use super::types::{PipelineError, PipelineRunSummary, RasterMetadataRecord};
use crate::indicators::DemographicIndicatorRow;
use crate::zonal::CombinedTable;

pub const COMBINED_TABLE_FILE: &str = "combined_population_summary.csv";
pub const TIDY_TABLE_FILE: &str = "population_tidy.csv";
pub const INDICATORS_FILE: &str = "demographic_indicators.csv";
pub const RASTER_METADATA_FILE: &str = "raster_metadata.csv";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

const COMBINED_HEADERS: [&str; 8] = [
    "country",
    "sex",
    "age_group",
    "district_id",
    "district",
    "region",
    "population",
    "pixel_count",
];

/// Columns consumed by the dashboard.
pub const TIDY_HEADERS: [&str; 5] = ["country", "district", "age_group", "sex", "population"];

const INDICATOR_HEADERS: [&str; 11] = [
    "country",
    "district_id",
    "district",
    "total_population",
    "child_percentage",
    "working_age_percentage",
    "elderly_percentage",
    "sex_ratio",
    "dependency_ratio",
    "male_population",
    "female_population",
];

const METADATA_HEADERS: [&str; 11] = [
    "country",
    "sex",
    "age_group",
    "data_loaded",
    "crs",
    "width",
    "height",
    "left",
    "bottom",
    "right",
    "top",
];

/// Create the output directory (and parents) if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(dir).map_err(|source| PipelineError::Output {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write `rows` as CSV under an explicit header row.
///
/// The header is written even when there are no rows.
pub fn write_csv<T: Serialize>(
    path: &Path,
    headers: &[&str],
    rows: impl IntoIterator<Item = T>,
) -> Result<(), PipelineError> {
    let file = File::create(path).map_err(|source| PipelineError::Output {
        path: path.to_path_buf(),
        source,
    })?;
    let serialize_err = |e: csv::Error| PipelineError::Serialize {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));
    writer.write_record(headers).map_err(serialize_err)?;
    for row in rows {
        writer.serialize(row).map_err(serialize_err)?;
    }
    writer.flush().map_err(|source| PipelineError::Output {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `value` as pretty-printed JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let content = serde_json::to_string_pretty(value).map_err(|e| PipelineError::Serialize {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut file = File::create(path).map_err(|source| PipelineError::Output {
        path: path.to_path_buf(),
        source,
    })?;
    file.write_all(content.as_bytes())
        .and_then(|_| file.write_all(b"\n"))
        .map_err(|source| PipelineError::Output {
            path: path.to_path_buf(),
            source,
        })
}

/// Write every run artifact into `dir`, returning the paths written.
pub fn write_artifacts(
    dir: &Path,
    table: &CombinedTable,
    indicators: &[DemographicIndicatorRow],
    metadata: &[RasterMetadataRecord],
    summary: &PipelineRunSummary,
) -> Result<Vec<PathBuf>, PipelineError> {
    ensure_output_dir(dir)?;

    let combined = dir.join(COMBINED_TABLE_FILE);
    write_csv(&combined, &COMBINED_HEADERS, table.cells())?;

    let tidy = dir.join(TIDY_TABLE_FILE);
    write_csv(&tidy, &TIDY_HEADERS, table.to_tidy())?;

    let indicator_path = dir.join(INDICATORS_FILE);
    write_csv(&indicator_path, &INDICATOR_HEADERS, indicators)?;

    let metadata_path = dir.join(RASTER_METADATA_FILE);
    write_csv(&metadata_path, &METADATA_HEADERS, metadata)?;

    let summary_path = dir.join(RUN_SUMMARY_FILE);
    write_json(&summary_path, summary)?;

    info!(
        directory = %dir.display(),
        rows = table.len(),
        districts = indicators.len(),
        "Saved pipeline outputs"
    );
    Ok(vec![combined, tidy, indicator_path, metadata_path, summary_path])
}

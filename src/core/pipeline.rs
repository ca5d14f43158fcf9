use polars::prelude::*;
use std::path::{Path, PathBuf};

use crate::adapters::csv_io;
use crate::core::calendar::add_calendar_features;
use crate::core::impute::impute_missing;
use crate::core::normalize::{normalize, TableSchema};
use crate::core::outlier::flag_quantity_outliers;
use crate::core::registry::Registry;
use crate::core::timezone::{localize_column, localized_column_name};
use crate::core::units::convert_to_kwh;
use crate::domain::model::Region;
use crate::domain::ports::{ConfigProvider, Storage};
use crate::utils::error::{EtlError, Result};

pub const MERGED_TABLE_NAME: &str = "transformed_consumption_data_merged";
pub const METER_COLUMN: &str = "NMI";
pub const REGION_COLUMN: &str = "STATE";

pub fn transformed_file_name(name: &str) -> String {
    format!("transformed_{}.csv", name)
}

/// Normalizes the master list and writes `<output_folder>/transformed_<name>.csv`.
pub fn transform_nmi_master<S: Storage>(storage: &S, file_path: &Path, output_folder: &Path) -> Result<DataFrame> {
    let name = csv_io::table_name(file_path);
    let raw = csv_io::load_csv(storage, file_path)?;
    let df = normalize(raw, &TableSchema::meter_master(), &name)?;

    let output = output_folder.join(transformed_file_name(&name));
    csv_io::save_table(storage, &df, &output)?;
    tracing::info!(
        "Transformed master list {} ({} meters) -> {}",
        file_path.display(),
        df.height(),
        output.display()
    );
    Ok(df)
}

/// Where and how to run the consumption transform.
#[derive(Debug, Clone)]
pub struct ConsumptionJob {
    pub folder: PathBuf,
    pub file_pattern: String,
    pub output_folder: PathBuf,
    pub lookup_file: PathBuf,
    pub timestamp_column: String,
}

impl ConsumptionJob {
    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self {
            folder: PathBuf::from(config.consumption_folder()),
            file_pattern: config.file_pattern().to_string(),
            output_folder: config.consumption_output_folder(),
            lookup_file: config.lookup_file(),
            timestamp_column: config.timestamp_column().to_uppercase(),
        }
    }
}

#[derive(Debug)]
pub struct FileFailure {
    pub meter_id: String,
    pub path: PathBuf,
    pub error: EtlError,
}

/// Outcome of one consumption batch.
#[derive(Debug)]
pub struct ConsumptionBatch {
    pub merged: DataFrame,
    /// Meters written, in processing order.
    pub processed: Vec<String>,
    /// Meters absent from the registry.
    pub skipped: Vec<String>,
    pub failures: Vec<FileFailure>,
}

impl ConsumptionBatch {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Files in `folder` matching `pattern`, sorted so merge order is reproducible.
///
/// Only `pattern` is glob syntax; the folder path is matched literally.
pub fn discover_files(folder: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full_pattern = Path::new(&glob::Pattern::escape(&folder.to_string_lossy())).join(pattern);
    let mut files: Vec<PathBuf> = glob::glob(&full_pattern.to_string_lossy())?
        .filter_map(|entry| match entry {
            Ok(path) if path.is_file() => Some(path),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Skipping unreadable path: {}", e);
                None
            }
        })
        .collect();
    files.sort();
    Ok(files)
}

/// The full per-meter stage chain, from a freshly loaded frame to the enriched output.
pub fn transform_meter_table(raw: DataFrame, meter_id: &str, region: Region, timestamp_column: &str) -> Result<DataFrame> {
    let ts = timestamp_column.to_uppercase();

    let df = normalize(raw, &TableSchema::consumption(&ts), meter_id)?;
    let df = impute_missing(df)?;
    let df = convert_to_kwh(df, meter_id)?;
    let df = localize_column(df, &ts, region, meter_id)?;
    let df = add_calendar_features(df, &localized_column_name(&ts), meter_id)?;
    let mut df = flag_quantity_outliers(df, meter_id)?;

    let height = df.height();
    df.with_column(Series::new(METER_COLUMN.into(), vec![meter_id; height]))?;
    df.with_column(Series::new(REGION_COLUMN.into(), vec![region.code(); height]))?;
    Ok(df)
}

/// Stacks per-meter frames in order. Columns missing from a frame are filled with nulls.
pub fn merge_tables(frames: Vec<DataFrame>) -> Result<DataFrame> {
    if frames.is_empty() {
        return Ok(DataFrame::empty());
    }
    let frames: Vec<LazyFrame> = frames.into_iter().map(|df| df.lazy()).collect();
    let args = UnionArgs {
        to_supertypes: true,
        ..Default::default()
    };
    Ok(concat_lf_diagonal(frames, args)?.collect()?)
}

fn process_meter_file<S: Storage>(
    storage: &S,
    path: &Path,
    meter_id: &str,
    registry: &Registry,
    job: &ConsumptionJob,
) -> Result<DataFrame> {
    let region = registry.region_of(meter_id)?;
    let raw = csv_io::load_csv(storage, path)?;
    let df = transform_meter_table(raw, meter_id, region, &job.timestamp_column)?;

    let output = job.output_folder.join(transformed_file_name(meter_id));
    csv_io::save_table(storage, &df, &output)?;
    tracing::info!("✅ {} ({}): {} rows -> {}", meter_id, region, df.height(), output.display());
    Ok(df)
}

/// Loads the registry once, then transforms every matching file against it.
pub fn transform_consumption<S: Storage>(storage: &S, job: &ConsumptionJob) -> Result<ConsumptionBatch> {
    let registry = Registry::load(storage, &job.lookup_file)?;
    transform_consumption_with_registry(storage, job, &registry)
}

pub fn transform_consumption_with_registry<S: Storage>(
    storage: &S,
    job: &ConsumptionJob,
    registry: &Registry,
) -> Result<ConsumptionBatch> {
    let files = discover_files(&job.folder, &job.file_pattern)?;
    tracing::info!(
        "Found {} consumption files in {} matching '{}'",
        files.len(),
        job.folder.display(),
        job.file_pattern
    );

    if registry.is_empty() {
        tracing::warn!("⚠️  Registry is empty, every consumption file will be skipped");
    }

    let mut frames = Vec::new();
    let mut processed = Vec::new();
    let mut skipped = Vec::new();
    let mut failures = Vec::new();

    for path in files {
        let meter_id = csv_io::table_name(&path);
        if !registry.contains(&meter_id) {
            tracing::warn!("⚠️  {} is not in the registry, skipping {}", meter_id, path.display());
            skipped.push(meter_id);
            continue;
        }

        match process_meter_file(storage, &path, &meter_id, registry, job) {
            Ok(df) => {
                frames.push(df);
                processed.push(meter_id);
            }
            Err(error) => {
                tracing::error!("❌ {} failed: {} ({})", meter_id, error, error.recovery_suggestion());
                failures.push(FileFailure {
                    meter_id,
                    path,
                    error,
                });
            }
        }
    }

    let merged = merge_tables(frames)?;
    let merged_path = job
        .output_folder
        .join(format!("{}.csv", MERGED_TABLE_NAME));
    csv_io::save_table(storage, &merged, &merged_path)?;
    tracing::info!(
        "Merged {} rows from {} meters -> {} ({} skipped, {} failed)",
        merged.height(),
        processed.len(),
        merged_path.display(),
        skipped.len(),
        failures.len()
    );

    Ok(ConsumptionBatch {
        merged,
        processed,
        skipped,
        failures,
    })
}

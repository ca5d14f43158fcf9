use anyhow::Context;
use clap::Parser;
use nmi_etl::adapters::csv_io::table_name;
use nmi_etl::core::normalize::{infer_types, uppercase_column_names};
use nmi_etl::core::registry::Registry;
use nmi_etl::core::Region;
use nmi_etl::domain::table::ColumnType;
use nmi_etl::inspect::{self, CheckOutcome};
use nmi_etl::utils::logger;
use nmi_etl::LocalStorage;
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "inspect")]
#[command(about = "Report data quality problems in NMI master and consumption extracts")]
struct Args {
    #[arg(long, default_value = "Data/nmi_info.csv")]
    master_file: PathBuf,

    #[arg(long, default_value = "Data/ConsumptionData")]
    consumption_folder: PathBuf,

    #[arg(long, default_value = "*.csv")]
    file_pattern: String,

    /// Comma-separated header expected in the master file
    #[arg(long, default_value = "NMI,STATE,INTERVAL")]
    master_header: String,

    /// Comma-separated header expected in every consumption file
    #[arg(long, default_value = "AESTTime,Quantity,Unit")]
    consumption_header: String,

    #[arg(long, default_value = "AESTTime")]
    timestamp_column: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn split_header(header: &str) -> Vec<&str> {
    header.split(',').map(str::trim).collect()
}

fn load_typed(storage: &LocalStorage, path: &Path) -> anyhow::Result<DataFrame> {
    let df = inspect::load_csv(storage, path)
        .with_context(|| format!("loading {}", path.display()))?;
    Ok(uppercase_column_names(infer_types(df)?)?)
}

fn inspect_master(storage: &LocalStorage, args: &Args, outcomes: &mut Vec<CheckOutcome>) -> anyhow::Result<Registry> {
    let subject = table_name(&args.master_file);
    outcomes.push(inspect::check_header(storage, &args.master_file, &split_header(&args.master_header))?);

    let master = load_typed(storage, &args.master_file)?;
    let regions: Vec<&str> = Region::ALL.iter().map(|r| r.code()).collect();

    outcomes.push(inspect::check_missing_data(&master, &subject));
    outcomes.push(inspect::check_duplicate_rows(&master, &subject)?);
    outcomes.push(inspect::check_value(&master, &subject, "STATE", &regions)?);
    outcomes.push(inspect::check_column_type(&master, &subject, "INTERVAL", ColumnType::Integer)?);

    let ids: Vec<String> = inspect::column_values(&master, &subject, "NMI")?;
    outcomes.push(inspect::check_unique(&ids));

    // 主檔有問題時仍繼續檢查用電資料
    let registry = match Registry::from_table(&master) {
        Ok(registry) => registry,
        Err(e) => {
            tracing::warn!("❌ Cannot build registry from {}: {}", args.master_file.display(), e);
            Registry::default()
        }
    };
    Ok(registry)
}

fn inspect_consumption(
    storage: &LocalStorage,
    args: &Args,
    registry: &Registry,
    outcomes: &mut Vec<CheckOutcome>,
) -> anyhow::Result<()> {
    let folder = &args.consumption_folder;
    let master_ids = registry.meter_ids();
    let meter_ids = inspect::meter_names(folder, &args.file_pattern)?;

    let non_csv: Vec<String> = inspect::list_matching_files(folder, ".*")?
        .into_iter()
        .filter(|name| !name.to_lowercase().ends_with(".csv"))
        .collect();
    outcomes.push(inspect::check_file_format(&non_csv, "csv"));
    outcomes.push(inspect::check_unique(&meter_ids));
    outcomes.push(inspect::check_missing_meters(&meter_ids, &master_ids));
    outcomes.push(inspect::check_missing_consumption(&master_ids, &meter_ids));

    let expected_header = split_header(&args.consumption_header);
    let ts = args.timestamp_column.to_uppercase();

    for (meter_id, path) in inspect::meter_file_map(folder, &args.file_pattern)? {
        tracing::info!("🔍 Inspecting {}", path.display());
        outcomes.push(inspect::check_header(storage, &path, &expected_header)?);

        let df = match load_typed(storage, &path) {
            Ok(df) => df,
            Err(e) => {
                tracing::warn!("❌ Cannot load {}: {:#}", path.display(), e);
                continue;
            }
        };
        let expected_interval = registry.get(&meter_id).map(|r| r.expected_interval_minutes);

        outcomes.push(inspect::check_missing_data(&df, &meter_id));
        outcomes.push(inspect::check_duplicate_rows(&df, &meter_id)?);
        outcomes.push(inspect::check_column_type(&df, &meter_id, &ts, ColumnType::Timestamp)?);
        outcomes.push(inspect::check_column_type(&df, &meter_id, "QUANTITY", ColumnType::Float)?);
        outcomes.push(inspect::check_consistent(&df, &meter_id, "UNIT")?);
        outcomes.push(inspect::check_value(&df, &meter_id, "UNIT", &["KWH", "MWH", "WH"])?);
        outcomes.push(inspect::check_outlier(&df, &meter_id, "QUANTITY")?);
        outcomes.push(inspect::check_datetime_freq(&df, &meter_id, &ts, expected_interval)?);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let storage = LocalStorage::new();
    let mut outcomes = Vec::new();

    let registry = inspect_master(&storage, &args, &mut outcomes)?;
    inspect_consumption(&storage, &args, &registry, &mut outcomes)?;

    let failed: Vec<&CheckOutcome> = outcomes.iter().filter(|o| !o.passed).collect();
    println!("📋 {} checks run, {} failed", outcomes.len(), failed.len());
    for outcome in &failed {
        println!("  ❌ {}", outcome);
    }

    if !failed.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

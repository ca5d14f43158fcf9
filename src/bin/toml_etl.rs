use clap::Parser;
use nmi_etl::core::pipeline::discover_files;
use nmi_etl::core::ConfigProvider;
use nmi_etl::utils::error::ErrorSeverity;
use nmi_etl::utils::{logger, validation::Validate};
use nmi_etl::{EtlEngine, LocalStorage, TomlConfig};
use std::path::Path;

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "NMI consumption ETL driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "etl-config.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Dry run - show what would be processed without executing
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    let args = Args::parse();

    // 載入 TOML 配置
    let config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    logger::init_logger(args.verbose || config.verbose(), config.json_logs());
    tracing::info!("🚀 Starting TOML-based ETL tool");
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&config);
        return;
    }

    let engine = EtlEngine::new(LocalStorage::new(), config);

    match engine.run() {
        Ok(report) => {
            let batch = &report.batch;
            println!(
                "✅ ETL process completed: {} processed, {} skipped, {} failed",
                batch.processed.len(),
                batch.skipped.len(),
                batch.failures.len()
            );
            for failure in &batch.failures {
                eprintln!("❌ {}: {}", failure.path.display(), failure.error.user_friendly_message());
            }
            if !batch.is_clean() {
                std::process::exit(2);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!("  Pipeline: {}", config.pipeline.name);
    if let Some(description) = &config.pipeline.description {
        println!("  Description: {}", description);
    }
    match config.master_file() {
        Some(master) => println!("  Master file: {}", master),
        None => println!("  Master file: (reuse existing lookup)"),
    }
    println!(
        "  Consumption: {} ({})",
        config.consumption_folder(),
        config.file_pattern()
    );
    println!("  Timestamp column: {}", config.timestamp_column());
    println!("  Lookup file: {}", config.lookup_file().display());
    println!("  Output: {}", config.consumption_output_folder().display());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &TomlConfig) {
    println!("🔍 Dry Run Analysis:");
    println!();

    match discover_files(Path::new(config.consumption_folder()), config.file_pattern()) {
        Ok(files) => {
            println!("📂 {} consumption files would be processed:", files.len());
            for file in files {
                println!("  {}", file.display());
            }
        }
        Err(e) => println!("❌ Cannot list consumption files: {}", e),
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}

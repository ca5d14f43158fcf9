use clap::Parser;
use nmi_etl::utils::error::ErrorSeverity;
use nmi_etl::utils::{logger, validation::Validate};
use nmi_etl::{CliConfig, EtlEngine, LocalStorage};

fn main() {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_logger(config.verbose, config.log_json);

    tracing::info!("Starting nmi-etl CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let engine = EtlEngine::new(LocalStorage::new(), config);

    match engine.run() {
        Ok(report) => {
            let batch = &report.batch;
            if let Some(meters) = report.master_meters {
                println!("📋 Master list: {} meters", meters);
            }
            println!(
                "✅ Consumption transform: {} processed, {} skipped, {} failed",
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
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
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

use clap::Parser;
use nmi_etl::{CliConfig, EtlEngine, EtlError, LocalStorage, TomlConfig};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    data: PathBuf,
    consumption: PathBuf,
    output: PathBuf,
}

impl Workspace {
    fn new(master: &str) -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let data = dir.path().join("Data");
        let consumption = data.join("ConsumptionData");
        fs::create_dir_all(&consumption)?;
        fs::write(data.join("nmi_info.csv"), master)?;
        let output = dir.path().join("Transformed");
        Ok(Self {
            _dir: dir,
            data,
            consumption,
            output,
        })
    }

    fn add_meter(&self, name: &str, content: &str) -> anyhow::Result<()> {
        fs::write(self.consumption.join(name), content)?;
        Ok(())
    }

    fn cli_config(&self) -> CliConfig {
        CliConfig::parse_from([
            "nmi-etl".to_string(),
            "--master-file".to_string(),
            self.data.join("nmi_info.csv").display().to_string(),
            "--consumption-folder".to_string(),
            self.consumption.display().to_string(),
            "--output-folder".to_string(),
            self.output.display().to_string(),
        ])
    }

    fn output_file(&self, name: &str) -> PathBuf {
        self.output.join("ConsumptionData").join(name)
    }
}

fn read_records(path: &Path) -> anyhow::Result<Vec<HashMap<String, String>>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let headers = rdr.headers()?.clone();
    let mut records = Vec::new();
    for record in rdr.records() {
        let record = record?;
        records.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        );
    }
    Ok(records)
}

const MASTER: &str = "nmi,state,interval\nNMI001,nsw,30\nNMI002,vic,30\n";

#[test]
fn test_end_to_end_nsw_meter() -> anyhow::Result<()> {
    let ws = Workspace::new(MASTER)?;
    ws.add_meter(
        "NMI001.csv",
        "AESTTime,Quantity,Unit\n2022-01-01 00:30:00,2.5,MWH\n2022-07-01 00:30:00,2.0,MWH\n",
    )?;

    let engine = EtlEngine::new(LocalStorage::new(), ws.cli_config());
    let report = engine.run()?;

    assert_eq!(report.master_meters, Some(2));
    assert_eq!(report.batch.processed, vec!["NMI001"]);
    assert!(report.batch.is_clean());

    let lookup = fs::read_to_string(ws.output.join("transformed_nmi_info.csv"))?;
    assert_eq!(lookup, "NMI,STATE,INTERVAL\nNMI001,NSW,30\nNMI002,VIC,30\n");

    let records = read_records(&ws.output_file("transformed_NMI001.csv"))?;
    assert_eq!(records.len(), 2);

    let summer = &records[0];
    assert_eq!(summer["AESTTIME"], "2022-01-01 00:30:00");
    assert_eq!(summer["QUANTITY"], "2500.0");
    assert_eq!(summer["UNIT"], "KWH");
    assert_eq!(summer["TRANSFORMED_AESTTIME"], "2022-01-01 01:30:00+11:00");
    assert_eq!(summer["HOUR"], "1");
    assert_eq!(summer["SESSION"], "1");
    assert_eq!(summer["SEASON"], "4");
    assert_eq!(summer["WEEKEND"], "1");
    assert_eq!(summer["OUTLIER"], "0");
    assert_eq!(summer["NMI"], "NMI001");
    assert_eq!(summer["STATE"], "NSW");

    let winter = &records[1];
    assert_eq!(winter["TRANSFORMED_AESTTIME"], "2022-07-01 00:30:00+10:00");
    assert_eq!(winter["SEASON"], "2");

    Ok(())
}

#[test]
fn test_unregistered_meter_is_skipped() -> anyhow::Result<()> {
    let ws = Workspace::new(MASTER)?;
    ws.add_meter("NMI001.csv", "AESTTime,Quantity,Unit\n2022-01-01 00:30:00,2.5,KWH\n")?;
    ws.add_meter("NMI999.csv", "AESTTime,Quantity,Unit\n2022-01-01 00:30:00,9.0,KWH\n")?;

    let report = EtlEngine::new(LocalStorage::new(), ws.cli_config()).run()?;

    assert_eq!(report.batch.skipped, vec!["NMI999"]);
    assert!(!ws.output_file("transformed_NMI999.csv").exists());

    let merged = read_records(&ws.output_file("transformed_consumption_data_merged.csv"))?;
    assert_eq!(merged.len(), 1);
    assert!(merged.iter().all(|r| r["NMI"] == "NMI001"));
    Ok(())
}

#[test]
fn test_failed_file_does_not_stop_batch() -> anyhow::Result<()> {
    let ws = Workspace::new(MASTER)?;
    ws.add_meter("NMI001.csv", "AESTTime,Quantity,Unit\n2022-01-01 00:30:00,2.5,KWH\n")?;
    ws.add_meter("NMI002.csv", "AESTTime,Quantity,Unit\nyesterday,2.5,KWH\n")?;

    let report = EtlEngine::new(LocalStorage::new(), ws.cli_config()).run()?;

    assert_eq!(report.batch.processed, vec!["NMI001"]);
    assert_eq!(report.batch.failures.len(), 1);
    assert_eq!(report.batch.failures[0].meter_id, "NMI002");
    assert!(matches!(
        report.batch.failures[0].error,
        EtlError::TypeConversionError { .. }
    ));
    assert!(!ws.output_file("transformed_NMI002.csv").exists());
    Ok(())
}

#[test]
fn test_unknown_region_fails_that_meter_only() -> anyhow::Result<()> {
    let ws = Workspace::new("nmi,state,interval\nNMI001,nsw,30\nNMI003,nt,30\n")?;
    ws.add_meter("NMI001.csv", "AESTTime,Quantity,Unit\n2022-01-01 00:30:00,2.5,KWH\n")?;
    ws.add_meter("NMI003.csv", "AESTTime,Quantity,Unit\n2022-01-01 00:30:00,1.0,KWH\n")?;

    let report = EtlEngine::new(LocalStorage::new(), ws.cli_config()).run()?;

    assert_eq!(report.master_meters, Some(2));
    assert_eq!(report.batch.processed, vec!["NMI001"]);
    assert_eq!(report.batch.failures.len(), 1);
    assert_eq!(report.batch.failures[0].meter_id, "NMI003");
    assert!(matches!(
        &report.batch.failures[0].error,
        EtlError::UnknownRegionError { code } if code == "NT"
    ));
    assert!(!ws.output_file("transformed_NMI003.csv").exists());

    let merged = read_records(&ws.output_file("transformed_consumption_data_merged.csv"))?;
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0]["NMI"], "NMI001");
    assert_eq!(merged[0]["STATE"], "NSW");
    Ok(())
}

#[test]
fn test_rerun_is_byte_identical() -> anyhow::Result<()> {
    let ws = Workspace::new(MASTER)?;
    ws.add_meter(
        "NMI001.csv",
        "AESTTime,Quantity,Unit\n2022-01-01 00:30:00,2.5,KWH\n2022-01-01 01:00:00,,KWH\n2022-01-01 01:30:00,3.0,KWH\n",
    )?;
    ws.add_meter("NMI002.csv", "AESTTime,Quantity,Unit\n2022-03-01 12:00:00,1.0,WH\n")?;

    let merged_path = ws.output_file("transformed_consumption_data_merged.csv");

    EtlEngine::new(LocalStorage::new(), ws.cli_config()).run()?;
    let first = fs::read(&merged_path)?;
    let first_meter = fs::read(ws.output_file("transformed_NMI001.csv"))?;

    EtlEngine::new(LocalStorage::new(), ws.cli_config()).run()?;
    assert_eq!(fs::read(&merged_path)?, first);
    assert_eq!(fs::read(ws.output_file("transformed_NMI001.csv"))?, first_meter);
    Ok(())
}

#[test]
fn test_missing_lookup_file_fails_run() -> anyhow::Result<()> {
    let ws = Workspace::new(MASTER)?;
    let config = CliConfig::parse_from([
        "nmi-etl".to_string(),
        "--consumption-folder".to_string(),
        ws.consumption.display().to_string(),
        "--output-folder".to_string(),
        ws.output.display().to_string(),
    ]);

    let result = EtlEngine::new(LocalStorage::new(), config).run();
    assert!(matches!(result, Err(EtlError::FileNotFound { .. })));
    Ok(())
}

#[test]
fn test_toml_configured_run() -> anyhow::Result<()> {
    let ws = Workspace::new(MASTER)?;
    ws.add_meter("NMI002.csv", "ReadingTime,Quantity,Unit\n2022-01-01 00:30:00,2.5,KWH\n")?;

    let content = format!(
        r#"
[pipeline]
name = "integration"

[master]
file = '{}'

[consumption]
folder = '{}'
timestamp_column = "ReadingTime"

[load]
output_folder = '{}'
"#,
        ws.data.join("nmi_info.csv").display(),
        ws.consumption.display(),
        ws.output.display()
    );
    let config = TomlConfig::from_toml_str(&content)?;

    let report = EtlEngine::new(LocalStorage::new(), config).run()?;
    assert_eq!(report.batch.processed, vec!["NMI002"]);

    let records = read_records(&ws.output_file("transformed_NMI002.csv"))?;
    assert_eq!(records[0]["TRANSFORMED_READINGTIME"], "2022-01-01 01:30:00+11:00");
    assert_eq!(records[0]["STATE"], "VIC");
    Ok(())
}

pub mod toml_config;

use crate::core::pipeline::transformed_file_name;
use crate::utils::error::Result;
use crate::utils::validation;
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::utils::validation::Validate;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_MASTER_NAME: &str = "nmi_info";
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "AESTTIME";

/// The master transform's output, which doubles as the registry lookup file.
pub fn default_lookup_file(output_folder: &str, master_file: Option<&str>) -> PathBuf {
    let name = master_file
        .map(|f| crate::adapters::csv_io::table_name(Path::new(f)))
        .unwrap_or_else(|| DEFAULT_MASTER_NAME.to_string());
    Path::new(output_folder).join(transformed_file_name(&name))
}

pub fn default_consumption_output_folder(output_folder: &str) -> PathBuf {
    Path::new(output_folder).join("ConsumptionData")
}

/// Checks shared by every configuration source.
pub(crate) fn validate_common(
    master_file: Option<&str>,
    consumption_folder: &str,
    file_pattern: &str,
    output_folder: &str,
    timestamp_column: &str,
) -> Result<()> {
    if let Some(master) = master_file {
        validation::validate_path("master_file", master)?;
        validation::validate_file_extension("master_file", master, &["csv"])?;
    }
    validation::validate_path("consumption_folder", consumption_folder)?;
    validation::validate_glob_pattern("file_pattern", file_pattern)?;
    validation::validate_path("output_folder", output_folder)?;
    validation::validate_non_empty_string("timestamp_column", timestamp_column)?;
    Ok(())
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "nmi-etl")]
#[command(about = "Batch transform of NMI master and meter consumption extracts")]
pub struct CliConfig {
    /// Raw NMI master list; omit to reuse an existing lookup file
    #[arg(long)]
    pub master_file: Option<String>,

    #[arg(long, default_value = "Data/ConsumptionData")]
    pub consumption_folder: String,

    #[arg(long, default_value = "*.csv")]
    pub file_pattern: String,

    #[arg(long, default_value = "Transformed")]
    pub output_folder: String,

    /// Defaults to <output-folder>/ConsumptionData
    #[arg(long)]
    pub consumption_output_folder: Option<String>,

    /// Defaults to the master transform output
    #[arg(long)]
    pub lookup_file: Option<String>,

    #[arg(long, default_value = DEFAULT_TIMESTAMP_COLUMN)]
    pub timestamp_column: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn master_file(&self) -> Option<&str> {
        self.master_file.as_deref()
    }

    fn consumption_folder(&self) -> &str {
        &self.consumption_folder
    }

    fn file_pattern(&self) -> &str {
        &self.file_pattern
    }

    fn output_folder(&self) -> &str {
        &self.output_folder
    }

    fn consumption_output_folder(&self) -> PathBuf {
        self.consumption_output_folder
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_consumption_output_folder(&self.output_folder))
    }

    fn lookup_file(&self) -> PathBuf {
        self.lookup_file
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_lookup_file(&self.output_folder, self.master_file.as_deref()))
    }

    fn timestamp_column(&self) -> &str {
        &self.timestamp_column
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_common(
            self.master_file.as_deref(),
            &self.consumption_folder,
            &self.file_pattern,
            &self.output_folder,
            &self.timestamp_column,
        )?;
        if let Some(lookup) = &self.lookup_file {
            validation::validate_path("lookup_file", lookup)?;
        }
        Ok(())
    }
}

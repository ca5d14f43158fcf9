use crate::config::{default_consumption_output_folder, default_lookup_file, validate_common, DEFAULT_TIMESTAMP_COLUMN};
use crate::core::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub master: Option<MasterConfig>,
    pub consumption: ConsumptionConfig,
    pub load: LoadConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumptionConfig {
    pub folder: String,
    pub file_pattern: Option<String>,
    pub timestamp_column: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_folder: String,
    pub consumption_output_folder: Option<String>,
    pub lookup_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub verbose: Option<bool>,
    /// "compact" (default) or "json"
    pub format: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_ROOT})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        if let Some(master) = &self.master {
            validation::validate_required_field("master.file", &master.file)?;
        }
        validate_common(
            self.master_file(),
            &self.consumption.folder,
            self.file_pattern(),
            &self.load.output_folder,
            self.timestamp_column(),
        )?;

        if let Some(format) = self.logging.as_ref().and_then(|l| l.format.as_deref()) {
            if !["compact", "json"].contains(&format) {
                return Err(EtlError::InvalidConfigValueError {
                    field: "logging.format".to_string(),
                    value: format.to_string(),
                    reason: "Valid formats: compact, json".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn verbose(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.verbose)
            .unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.format.as_deref())
            .is_some_and(|f| f == "json")
    }
}

impl ConfigProvider for TomlConfig {
    fn master_file(&self) -> Option<&str> {
        self.master.as_ref().and_then(|m| m.file.as_deref())
    }

    fn consumption_folder(&self) -> &str {
        &self.consumption.folder
    }

    fn file_pattern(&self) -> &str {
        self.consumption.file_pattern.as_deref().unwrap_or("*.csv")
    }

    fn output_folder(&self) -> &str {
        &self.load.output_folder
    }

    fn consumption_output_folder(&self) -> PathBuf {
        self.load
            .consumption_output_folder
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_consumption_output_folder(&self.load.output_folder))
    }

    fn lookup_file(&self) -> PathBuf {
        self.load
            .lookup_file
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_lookup_file(&self.load.output_folder, self.master_file()))
    }

    fn timestamp_column(&self) -> &str {
        self.consumption
            .timestamp_column
            .as_deref()
            .unwrap_or(DEFAULT_TIMESTAMP_COLUMN)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

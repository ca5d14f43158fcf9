use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("File has no data: {path}")]
    EmptyInput { path: String },

    #[error("Malformed CSV in {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Cannot cast value '{value}' in column {column} to {target}")]
    TypeConversionError {
        column: String,
        value: String,
        target: String,
    },

    #[error("Unknown region code: {code}")]
    UnknownRegionError { code: String },

    #[error("Meter {meter_id} is not present in the registry")]
    UnresolvedMeterError { meter_id: String },

    #[error("Invalid input in {source_name}: {message}")]
    UnclassifiedInputError { source_name: String, message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("DataFrame operation failed: {0}")]
    FrameError(#[from] polars::prelude::PolarsError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid file pattern: {0}")]
    PatternError(#[from] glob::PatternError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Transform,
    Config,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::FileNotFound { .. }
            | EtlError::EmptyInput { .. }
            | EtlError::ParseError { .. }
            | EtlError::UnclassifiedInputError { .. }
            | EtlError::CsvError(_) => ErrorCategory::Input,
            EtlError::TypeConversionError { .. }
            | EtlError::UnknownRegionError { .. }
            | EtlError::UnresolvedMeterError { .. }
            | EtlError::FrameError(_) => ErrorCategory::Transform,
            EtlError::PatternError(_)
            | EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Config,
            EtlError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 單一檔案的資料問題，批次仍可繼續
            ErrorCategory::Input | ErrorCategory::Transform => ErrorSeverity::Medium,
            ErrorCategory::Config => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::FileNotFound { .. } => "Check that the input path exists and is readable",
            EtlError::EmptyInput { .. } => "Re-export the extract; the file contains no rows",
            EtlError::ParseError { .. } | EtlError::CsvError(_) => {
                "Check the delimiter and quoting of the CSV file"
            }
            EtlError::TypeConversionError { .. } => {
                "Fix the offending value in the source extract or adjust the column schema"
            }
            EtlError::UnknownRegionError { .. } => {
                "Use one of VIC, NSW, SA, WA, TAS, QLD, ACT in the master file STATE column"
            }
            EtlError::UnresolvedMeterError { .. } => {
                "Add the meter to the master file and re-run the master transform"
            }
            EtlError::UnclassifiedInputError { .. } => "Inspect the input file with the inspect tool",
            EtlError::FrameError(_) => "Check that every consumption file shares one column layout",
            EtlError::IoError(_) => "Check disk space and folder permissions",
            EtlError::PatternError(_) => "Use a valid glob pattern such as *.csv",
            EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::ConfigValidationError { .. } => {
                "Review the command line options or the TOML configuration file"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input => format!("Input data problem: {}", self),
            ErrorCategory::Transform => format!("Transform failed: {}", self),
            ErrorCategory::Config => format!("Configuration problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    pub(crate) fn conversion(column: &str, value: impl ToString, target: &str) -> Self {
        EtlError::TypeConversionError {
            column: column.to_string(),
            value: value.to_string(),
            target: target.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

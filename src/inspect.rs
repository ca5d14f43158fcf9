//! Stateless input inspection checks.
//!
//! Each check returns a [`CheckOutcome`] naming the table or file it looked at and
//! logs it. None of them modify their input or stop a run; callers decide what a
//! failed check means.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use regex::Regex;

use crate::adapters::csv_io;
use crate::core::outlier::iqr_bounds;
use crate::core::pipeline::discover_files;
use crate::domain::ports::Storage;
use crate::domain::table::{
    cast_series, column_names, display_values, has_duplicate_rows, parse_timestamp, require_column,
    timestamp_values, ColumnType,
};
use crate::utils::error::{EtlError, Result};

pub use crate::adapters::csv_io::load_csv;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub check: &'static str,
    pub subject: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckOutcome {
    fn report(check: &'static str, subject: impl Into<String>, passed: bool, detail: String) -> Self {
        let outcome = Self {
            check,
            subject: subject.into(),
            passed,
            detail,
        };
        if outcome.passed {
            tracing::info!("✅ {}", outcome);
        } else {
            tracing::warn!("❌ {}", outcome);
        }
        outcome
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.check, self.subject, self.detail)
    }
}

/// File names in `folder` matching a regular expression, sorted.
pub fn list_matching_files(folder: &Path, pattern: &str) -> Result<Vec<String>> {
    let re = Regex::new(pattern).map_err(|e| EtlError::InvalidConfigValueError {
        field: "pattern".to_string(),
        value: pattern.to_string(),
        reason: e.to_string(),
    })?;
    let mut names = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let name = entry?.file_name().to_string_lossy().to_string();
        if re.is_match(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Meter ids (file name up to the first `.`) of files matching a glob, in path order.
pub fn meter_names(folder: &Path, file_pattern: &str) -> Result<Vec<String>> {
    Ok(discover_files(folder, file_pattern)?
        .iter()
        .map(|p| csv_io::table_name(p))
        .collect())
}

pub fn meter_file_map(folder: &Path, file_pattern: &str) -> Result<BTreeMap<String, PathBuf>> {
    Ok(discover_files(folder, file_pattern)?
        .into_iter()
        .map(|p| (csv_io::table_name(&p), p))
        .collect())
}

pub fn check_header<S: Storage>(storage: &S, path: &Path, expected: &[&str]) -> Result<CheckOutcome> {
    let data = storage.read_file(path)?;
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(data.as_slice());
    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let passed = header.iter().map(String::as_str).eq(expected.iter().copied());
    let detail = if passed {
        format!("has expected header {:?}", expected)
    } else {
        format!("header {:?} differs from expected {:?}", header, expected)
    };
    Ok(CheckOutcome::report("header", path.display().to_string(), passed, detail))
}

pub fn check_columns(df: &DataFrame, subject: &str, expected: &[&str]) -> CheckOutcome {
    let names = column_names(df);
    let passed = names.iter().map(String::as_str).eq(expected.iter().copied());
    let detail = if passed {
        format!("shows expected columns {:?}", expected)
    } else {
        format!("columns {:?} differ from expected {:?}", names, expected)
    };
    CheckOutcome::report("columns", subject, passed, detail)
}

/// `non_conforming` lists the items found not to be in `expected_format`.
pub fn check_file_format(non_conforming: &[String], expected_format: &str) -> CheckOutcome {
    let passed = non_conforming.is_empty();
    let detail = if passed {
        format!("all items are {}", expected_format)
    } else {
        format!("{} items are not {}: {:?}", non_conforming.len(), expected_format, non_conforming)
    };
    CheckOutcome::report("file_format", "files", passed, detail)
}

pub fn check_unique(items: &[String]) -> CheckOutcome {
    let mut seen = HashSet::new();
    let duplicates: Vec<&String> = items.iter().filter(|i| !seen.insert(*i)).collect();
    let passed = duplicates.is_empty();
    let detail = if passed {
        "all items are unique".to_string()
    } else {
        format!("items are not unique: {:?}", duplicates)
    };
    CheckOutcome::report("unique", "items", passed, detail)
}

fn missing_from<'a>(items: &'a [String], reference: &[String]) -> Vec<&'a String> {
    let reference: HashSet<&String> = reference.iter().collect();
    items.iter().filter(|i| !reference.contains(i)).collect()
}

/// Meters that have consumption data but are absent from the master list.
pub fn check_missing_meters(consumption_ids: &[String], master_ids: &[String]) -> CheckOutcome {
    let missing = missing_from(consumption_ids, master_ids);
    let passed = missing.is_empty();
    let detail = if passed {
        "every meter with consumption data is in the master list".to_string()
    } else {
        format!("{:?} have consumption data but are missing from the master list", missing)
    };
    CheckOutcome::report("missing_meters", "master list", passed, detail)
}

/// Meters in the master list without a consumption file.
pub fn check_missing_consumption(master_ids: &[String], consumption_ids: &[String]) -> CheckOutcome {
    let missing = missing_from(master_ids, consumption_ids);
    let passed = missing.is_empty();
    let detail = if passed {
        "every meter in the master list has consumption data".to_string()
    } else {
        format!("{:?} are in the master list but have no consumption data", missing)
    };
    CheckOutcome::report("missing_consumption", "consumption data", passed, detail)
}

pub fn check_missing_data(df: &DataFrame, subject: &str) -> CheckOutcome {
    let columns: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| c.null_count() > 0)
        .map(|c| c.name().to_string())
        .collect();
    let passed = columns.is_empty();
    let detail = if passed {
        "does not have missing data".to_string()
    } else {
        format!("has missing data in {:?}", columns)
    };
    CheckOutcome::report("missing_data", subject, passed, detail)
}

/// A text column passes for a stricter type when every value parses as that type.
/// Integer columns pass as floats.
pub fn check_column_type(df: &DataFrame, subject: &str, column: &str, expected: ColumnType) -> Result<CheckOutcome> {
    let series = require_column(df, subject, column)?;
    let actual = ColumnType::of(series.dtype());
    let passed = actual == expected
        || (actual == ColumnType::Integer && expected == ColumnType::Float)
        || (actual == ColumnType::Text && cast_series(series, expected).is_ok());
    let detail = if passed {
        format!("{} has expected {} type", column, expected)
    } else {
        format!("{} has {} type, should be {}", column, actual, expected)
    };
    Ok(CheckOutcome::report("column_type", subject, passed, detail))
}

/// Non-null values of `column` as they would be written out, in row order.
pub fn column_values(df: &DataFrame, subject: &str, column: &str) -> Result<Vec<String>> {
    Ok(display_values(require_column(df, subject, column)?)?
        .into_iter()
        .flatten()
        .collect())
}

fn distinct_values(series: &Series) -> Result<Vec<String>> {
    let mut values: Vec<String> = display_values(series)?.into_iter().flatten().collect();
    values.sort();
    values.dedup();
    Ok(values)
}

pub fn check_value(df: &DataFrame, subject: &str, column: &str, allowed: &[&str]) -> Result<CheckOutcome> {
    let unexpected: Vec<String> = distinct_values(require_column(df, subject, column)?)?
        .into_iter()
        .filter(|v| !allowed.contains(&v.as_str()))
        .collect();
    let passed = unexpected.is_empty();
    let detail = if passed {
        format!("{} only has values from {:?}", column, allowed)
    } else {
        format!("{} has values {:?} not from {:?}", column, unexpected, allowed)
    };
    Ok(CheckOutcome::report("value", subject, passed, detail))
}

pub fn check_duplicate_rows(df: &DataFrame, subject: &str) -> Result<CheckOutcome> {
    let passed = !has_duplicate_rows(df)?;
    let detail = if passed {
        "does not have duplicate rows".to_string()
    } else {
        "has duplicate rows".to_string()
    };
    Ok(CheckOutcome::report("duplicate_rows", subject, passed, detail))
}

pub fn check_consistent(df: &DataFrame, subject: &str, column: &str) -> Result<CheckOutcome> {
    let values = distinct_values(require_column(df, subject, column)?)?;
    let passed = values.len() == 1;
    let detail = if passed {
        format!("{} has consistent values {:?}", column, values)
    } else {
        format!("{} has inconsistent values {:?}", column, values)
    };
    Ok(CheckOutcome::report("consistent", subject, passed, detail))
}

/// Values that do not read as numbers are left out.
pub fn check_outlier(df: &DataFrame, subject: &str, column: &str) -> Result<CheckOutcome> {
    let values: Vec<f64> = require_column(df, subject, column)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .flatten()
        .collect();
    let outliers = iqr_bounds(&values)
        .map(|b| values.iter().filter(|v| b.is_outlier(**v)).count())
        .unwrap_or(0);
    let passed = outliers == 0;
    let detail = if passed {
        format!("{} does not have outliers", column)
    } else {
        format!("{} has {} outliers", column, outliers)
    };
    Ok(CheckOutcome::report("outlier", subject, passed, detail))
}

/// Checks that readings arrive at one regular interval, optionally a given one.
///
/// Nulls and duplicated timestamps are ignored.
pub fn check_datetime_freq(
    df: &DataFrame,
    subject: &str,
    column: &str,
    expected_minutes: Option<i64>,
) -> Result<CheckOutcome> {
    let series = require_column(df, subject, column)?;
    let mut times: Vec<_> = if series.dtype() == &DataType::String {
        series.str()?.into_iter().flatten().filter_map(parse_timestamp).collect()
    } else {
        timestamp_values(series)?.into_iter().flatten().collect()
    };
    times.sort();
    times.dedup();

    let mut counts: HashMap<i64, usize> = HashMap::new();
    for pair in times.windows(2) {
        *counts.entry((pair[1] - pair[0]).num_minutes()).or_default() += 1;
    }

    let (passed, detail) = match (counts.len(), expected_minutes) {
        (0, _) => (false, "has too few readings to infer an interval".to_string()),
        (1, expected) => {
            let interval = counts.keys().next().copied().unwrap_or_default();
            match expected {
                Some(e) if e != interval => (
                    false,
                    format!("shows {} minute interval, expected {}", interval, e),
                ),
                _ => (true, format!("shows consistent interval of {} minutes", interval)),
            }
        }
        _ => {
            let mut intervals: Vec<i64> = counts.keys().copied().collect();
            intervals.sort();
            (false, format!("shows inconsistent intervals {:?} minutes", intervals))
        }
    };
    Ok(CheckOutcome::report("datetime_freq", subject, passed, detail))
}

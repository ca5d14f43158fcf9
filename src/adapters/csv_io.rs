use crate::domain::ports::Storage;
use crate::domain::table::{column_names, display_values};
use crate::utils::error::{EtlError, Result};
use csv::{ReaderBuilder, WriterBuilder};
use polars::prelude::*;
use std::path::{Path, PathBuf};

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Name used for a table loaded from `path`: the file name up to the first `.`.
pub fn table_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.split('.').next().unwrap_or(n).to_string())
        .unwrap_or_default()
}

/// Loads a CSV through `storage`. Every failure is returned, never a half-built table.
pub fn load_csv<S: Storage>(storage: &S, path: &Path) -> Result<DataFrame> {
    let data = storage.read_file(path).map_err(|e| match e {
        EtlError::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => EtlError::FileNotFound {
            path: path.display().to_string(),
        },
        other => other,
    })?;
    let df = read_table(&data, &table_name(path), b',').map_err(|e| match e {
        EtlError::EmptyInput { .. } => EtlError::EmptyInput {
            path: path.display().to_string(),
        },
        EtlError::ParseError { message, .. } => EtlError::ParseError {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })?;
    tracing::debug!("Loaded {} rows from {}", df.height(), path.display());
    Ok(df)
}

/// Parses CSV bytes into a frame of string columns. Blank fields load as nulls.
pub fn read_table(data: &[u8], name: &str, delimiter: u8) -> Result<DataFrame> {
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(EtlError::EmptyInput {
            path: name.to_string(),
        });
    }

    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(data);

    let parse_error = |message: String| EtlError::ParseError {
        path: name.to_string(),
        message,
    };

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| parse_error(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for result in rdr.records() {
        let record = result.map_err(|e| parse_error(e.to_string()))?;
        for (column, field) in values.iter_mut().zip(record.iter()) {
            column.push(if field.trim().is_empty() {
                None
            } else {
                Some(field.to_string())
            });
        }
    }

    let columns = headers
        .iter()
        .zip(values)
        .map(|(header, values)| Column::from(Series::new(header.as_str().into(), values)))
        .collect();
    // 重複的欄位名稱在這裡被拒絕
    DataFrame::new(columns).map_err(|e| parse_error(e.to_string()))
}

/// Renders a frame as comma-separated CSV with a header row and no index column.
pub fn write_table(df: &DataFrame) -> Result<Vec<u8>> {
    if df.width() == 0 {
        return Ok(Vec::new());
    }
    let columns = df
        .get_columns()
        .iter()
        .map(|c| display_values(c.as_materialized_series()))
        .collect::<Result<Vec<_>>>()?;

    let mut wtr = WriterBuilder::new().from_writer(Vec::new());
    wtr.write_record(column_names(df))?;
    for row in 0..df.height() {
        wtr.write_record(columns.iter().map(|c| c[row].as_deref().unwrap_or("")))?;
    }
    wtr.into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

pub fn save_table<S: Storage>(storage: &S, df: &DataFrame, path: &Path) -> Result<()> {
    // 先完整序列化，避免寫出半個檔案
    let data = write_table(df)?;
    storage.write_file(path, &data)?;
    tracing::debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// Guesses the delimiter from the first data row: the candidate producing the most fields wins.
pub fn sniff_delimiter(data: &[u8]) -> u8 {
    let text = String::from_utf8_lossy(data);
    let Some(sample) = text.lines().filter(|l| !l.trim().is_empty()).nth(1) else {
        return b',';
    };

    DELIMITER_CANDIDATES
        .iter()
        .copied()
        .map(|d| (d, sample.matches(d as char).count()))
        .filter(|(_, count)| *count > 0)
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

/// Rewrites a file with any common delimiter as `<output_folder>/<name>.csv`.
pub fn convert_to_csv<S: Storage>(storage: &S, path: &Path, output_folder: &Path) -> Result<PathBuf> {
    let data = storage.read_file(path)?;
    let delimiter = sniff_delimiter(&data);
    let name = table_name(path);
    let df = read_table(&data, &name, delimiter)?;

    let target = output_folder.join(format!("{}.csv", name));
    save_table(storage, &df, &target)?;
    tracing::info!(
        "Converted {} ('{}' delimited) to {}",
        path.display(),
        delimiter as char,
        target.display()
    );
    Ok(target)
}

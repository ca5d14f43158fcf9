//! Column typing, parsing and rendering on top of polars [`DataFrame`]s.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::fmt;

use crate::utils::error::{EtlError, Result};

pub const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const OFFSET_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

const TIMESTAMP_INPUT_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Logical column types the pipeline reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Naive timestamps are stored as millisecond `Datetime` without a zone.
    pub fn dtype(self) -> DataType {
        match self {
            ColumnType::Text => DataType::String,
            ColumnType::Integer => DataType::Int64,
            ColumnType::Float => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Timestamp => DataType::Datetime(TimeUnit::Milliseconds, None),
        }
    }

    pub fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => ColumnType::Integer,
            DataType::Float32 | DataType::Float64 => ColumnType::Float,
            DataType::Boolean => ColumnType::Boolean,
            DataType::Datetime(_, _) => ColumnType::Timestamp,
            _ => ColumnType::Text,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// `v` as an `i64` when it is integral and inside the `i64` range.
pub fn integral_f64(v: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    (v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64).then_some(v as i64)
}

pub fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>().ok().or_else(|| {
        // "30.0" is how spreadsheet exports often write integers
        s.parse::<f64>().ok().and_then(integral_f64)
    })
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    TIMESTAMP_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Looks up `name`, reporting a missing column as an input error against `source`.
pub fn require_column<'a>(df: &'a DataFrame, source: &str, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(Column::as_materialized_series)
        .map_err(|_| EtlError::UnclassifiedInputError {
            source_name: source.to_string(),
            message: format!("missing column {}", name),
        })
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().into_iter().map(|n| n.to_string()).collect()
}

fn parse_each<T>(
    values: &StringChunked,
    column: &str,
    target: ColumnType,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<Option<T>>> {
    values
        .into_iter()
        .map(|v| match v {
            Some(s) => parse(s)
                .map(Some)
                .ok_or_else(|| EtlError::conversion(column, s, &target.to_string())),
            None => Ok(None),
        })
        .collect()
}

/// Casts `series` to `target`. Nulls stay null; any other value that does not
/// convert fails with a [`EtlError::TypeConversionError`] naming it.
pub fn cast_series(series: &Series, target: ColumnType) -> Result<Series> {
    let name = series.name().clone();
    let column = name.as_str();
    let current = ColumnType::of(series.dtype());

    if series.dtype() == &DataType::String {
        let values = series.str()?;
        return match target {
            ColumnType::Text => Ok(series.clone()),
            ColumnType::Integer => Ok(Series::new(
                name.clone(),
                parse_each(values, column, target, parse_integer)?,
            )),
            ColumnType::Float => Ok(Series::new(
                name.clone(),
                parse_each(values, column, target, |s| s.trim().parse::<f64>().ok())?,
            )),
            ColumnType::Boolean => Ok(Series::new(
                name.clone(),
                parse_each(values, column, target, |s| {
                    match s.trim().to_ascii_lowercase().as_str() {
                        "1" | "true" => Some(true),
                        "0" | "false" => Some(false),
                        _ => None,
                    }
                })?,
            )),
            ColumnType::Timestamp => {
                timestamp_series(column, &parse_each(values, column, target, parse_timestamp)?)
            }
        };
    }

    match (current, target) {
        (a, b) if a == b => Ok(series.clone()),
        (_, ColumnType::Text) => Ok(Series::new(name.clone(), display_values(series)?)),
        (ColumnType::Integer, ColumnType::Float) => Ok(series.cast(&DataType::Float64)?),
        (ColumnType::Float, ColumnType::Integer) => {
            let values = series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| match v {
                    Some(v) => integral_f64(v)
                        .map(Some)
                        .ok_or_else(|| EtlError::conversion(column, v, "integer")),
                    None => Ok(None),
                })
                .collect::<Result<Vec<Option<i64>>>>()?;
            Ok(Series::new(name.clone(), values))
        }
        _ => Err(EtlError::conversion(column, series.dtype(), &target.to_string())),
    }
}

pub fn timestamp_series(name: &str, values: &[Option<NaiveDateTime>]) -> Result<Series> {
    let millis: Vec<Option<i64>> = values
        .iter()
        .map(|v| v.map(|t| t.and_utc().timestamp_millis()))
        .collect();
    Ok(Series::new(name.into(), millis).cast(&ColumnType::Timestamp.dtype())?)
}

/// Values of a `Datetime` column as naive wall-clock timestamps.
pub fn timestamp_values(series: &Series) -> Result<Vec<Option<NaiveDateTime>>> {
    let DataType::Datetime(unit, _) = series.dtype() else {
        return Err(EtlError::conversion(
            series.name().as_str(),
            series.dtype(),
            &ColumnType::Timestamp.to_string(),
        ));
    };
    let unit = *unit;
    let raw = series.cast(&DataType::Int64)?;
    let values = raw
        .i64()?
        .into_iter()
        .map(|v| {
            v.and_then(|v| match unit {
                TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
                TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
                TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
            })
            .map(|t| t.naive_utc())
        })
        .collect();
    Ok(values)
}

fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

/// How each value is written out: integral floats keep one decimal, booleans
/// are `1`/`0`, timestamps use [`NAIVE_TIMESTAMP_FORMAT`]. Nulls are `None`.
pub fn display_values(series: &Series) -> Result<Vec<Option<String>>> {
    let values: Vec<Option<String>> = match ColumnType::of(series.dtype()) {
        ColumnType::Text if series.dtype() == &DataType::String => series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect(),
        ColumnType::Text => series
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect(),
        ColumnType::Integer => series
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.map(|v| v.to_string()))
            .collect(),
        ColumnType::Float => series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.map(format_float))
            .collect(),
        ColumnType::Boolean => series
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| if b { "1" } else { "0" }.to_string()))
            .collect(),
        ColumnType::Timestamp => timestamp_values(series)?
            .into_iter()
            .map(|v| v.map(|t| t.format(NAIVE_TIMESTAMP_FORMAT).to_string()))
            .collect(),
    };
    Ok(values)
}

pub fn has_duplicate_rows(df: &DataFrame) -> Result<bool> {
    let distinct = df.unique_stable(None, UniqueKeepStrategy::First, None)?;
    Ok(distinct.height() < df.height())
}

/// Rendered values of one column, nulls as empty strings.
#[cfg(test)]
pub(crate) fn column_text(df: &DataFrame, name: &str) -> Vec<String> {
    let series = require_column(df, "test", name).unwrap();
    display_values(series)
        .unwrap()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(name: &str, values: &[Option<&str>]) -> Series {
        Series::new(name.into(), values)
    }

    #[test]
    fn test_cast_integer_accepts_integral_float_text() {
        let cast = cast_series(&text("INTERVAL", &[Some("30.0"), None]), ColumnType::Integer).unwrap();
        assert_eq!(cast.dtype(), &DataType::Int64);
        assert_eq!(cast.i64().unwrap().get(0), Some(30));
        assert_eq!(cast.null_count(), 1);
        assert!(cast_series(&text("INTERVAL", &[Some("30.5")]), ColumnType::Integer).is_err());
    }

    #[test]
    fn test_integer_cast_rejects_out_of_range_values() {
        assert_eq!(parse_integer("1e30"), None);
        assert_eq!(parse_integer("-1e19"), None);
        assert_eq!(parse_integer("9.2e18"), Some(9_200_000_000_000_000_000));

        let err = cast_series(&text("INTERVAL", &[Some("1e30")]), ColumnType::Integer).unwrap_err();
        assert!(matches!(err, EtlError::TypeConversionError { ref column, .. } if column == "INTERVAL"));

        let floats = Series::new("INTERVAL".into(), &[1e30_f64]);
        assert!(matches!(
            cast_series(&floats, ColumnType::Integer),
            Err(EtlError::TypeConversionError { .. })
        ));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2022, 1, 1)
            .unwrap()
            .and_hms_opt(0, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2022-01-01 00:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2022-01-01T00:30:00"), Some(expected));
        assert_eq!(parse_timestamp("01/01/2022 00:30"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_timestamp_column_keeps_wall_clock() {
        let cast = cast_series(
            &text("AESTTIME", &[Some("2022-01-01 00:30:00"), None]),
            ColumnType::Timestamp,
        )
        .unwrap();
        assert_eq!(ColumnType::of(cast.dtype()), ColumnType::Timestamp);
        assert_eq!(
            display_values(&cast).unwrap(),
            vec![Some("2022-01-01 00:30:00".to_string()), None]
        );
    }

    #[test]
    fn test_display_keeps_one_decimal_for_integral_floats() {
        let floats = Series::new("Q".into(), &[Some(2500.0), Some(0.0025), None]);
        assert_eq!(
            display_values(&floats).unwrap(),
            vec![Some("2500.0".to_string()), Some("0.0025".to_string()), None]
        );
        let flags = Series::new("F".into(), &[true, false]);
        assert_eq!(
            display_values(&flags).unwrap(),
            vec![Some("1".to_string()), Some("0".to_string())]
        );
    }

    #[test]
    fn test_has_duplicate_rows() {
        let df = DataFrame::new(vec![
            Column::from(text("NMI", &[Some("A"), Some("A")])),
            Column::from(Series::new("INTERVAL".into(), &[30_i64, 30])),
        ])
        .unwrap();
        assert!(has_duplicate_rows(&df).unwrap());
        assert!(!has_duplicate_rows(&df.head(Some(1))).unwrap());
    }

    #[test]
    fn test_require_column_names_source() {
        let df = DataFrame::new(vec![Column::from(text("NMI", &[Some("A")]))]).unwrap();
        assert!(require_column(&df, "nmi_info", "NMI").is_ok());
        assert!(matches!(
            require_column(&df, "nmi_info", "STATE"),
            Err(EtlError::UnclassifiedInputError { ref source_name, .. }) if source_name == "nmi_info"
        ));
    }
}

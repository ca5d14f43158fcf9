//! Record normalization: column naming, typing, casing and de-duplication
//! for a single input table.

use polars::prelude::*;

use crate::domain::table::{cast_series, require_column, ColumnType};
use crate::utils::error::{EtlError, Result};

/// What a normalized table must look like.
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Columns that must exist, with the type each is cast to. Names are upper-case.
    pub casts: Vec<(String, ColumnType)>,
    /// Rows sharing a value here are all removed.
    pub unique_key: Option<String>,
    /// Rows with a null in any of these columns are removed.
    pub required: Vec<String>,
}

impl TableSchema {
    /// `NMI,STATE,INTERVAL` master list.
    pub fn meter_master() -> Self {
        Self {
            casts: vec![
                ("NMI".to_string(), ColumnType::Text),
                ("STATE".to_string(), ColumnType::Text),
                ("INTERVAL".to_string(), ColumnType::Integer),
            ],
            unique_key: Some("NMI".to_string()),
            required: vec!["NMI".to_string(), "STATE".to_string()],
        }
    }

    /// Per-meter interval readings keyed by `timestamp_column`.
    pub fn consumption(timestamp_column: &str) -> Self {
        let ts = timestamp_column.to_uppercase();
        Self {
            casts: vec![
                (ts.clone(), ColumnType::Timestamp),
                ("QUANTITY".to_string(), ColumnType::Float),
                ("UNIT".to_string(), ColumnType::Text),
            ],
            unique_key: Some(ts.clone()),
            required: vec![ts],
        }
    }
}

/// Gives every column of a freshly loaded frame its inferred type, without any other cleaning.
pub fn infer_types(df: DataFrame) -> Result<DataFrame> {
    let schema = TableSchema {
        casts: Vec::new(),
        unique_key: None,
        required: Vec::new(),
    };
    cast_columns(df, &schema, "")
}

/// Runs every normalization step in order. `source` names the input in errors and logs.
pub fn normalize(df: DataFrame, schema: &TableSchema, source: &str) -> Result<DataFrame> {
    let before = df.height();

    let df = uppercase_column_names(df)?;
    let df = cast_columns(df, schema, source)?;
    let df = uppercase_text_values(df)?;
    let df = drop_duplicate_rows(df)?;
    let df = match &schema.unique_key {
        Some(key) => drop_duplicate_keys(df, key, source)?,
        None => df,
    };
    let df = drop_missing_required(df, &schema.required, source)?;

    tracing::debug!("Normalized {}: {} -> {} rows", source, before, df.height());
    Ok(df)
}

pub fn uppercase_column_names(df: DataFrame) -> Result<DataFrame> {
    let columns = df
        .get_columns()
        .iter()
        .map(|c| {
            let mut series = c.as_materialized_series().clone();
            let name = series.name().trim().to_uppercase();
            series.rename(name.into());
            Column::from(series)
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Casts schema columns to their declared type and infers a type for every other text column.
pub fn cast_columns(df: DataFrame, schema: &TableSchema, source: &str) -> Result<DataFrame> {
    let mut df = df;
    for (name, kind) in &schema.casts {
        let series = require_column(&df, source, name)?;
        if *kind == ColumnType::Integer && series.null_count() > 0 {
            return Err(EtlError::conversion(name, "", &kind.to_string()));
        }
        let cast = cast_series(series, *kind)?;
        df.with_column(cast)?;
    }

    let untyped: Vec<Series> = df
        .get_columns()
        .iter()
        .map(|c| c.as_materialized_series())
        .filter(|s| s.dtype() == &DataType::String)
        .filter(|s| !schema.casts.iter().any(|(name, _)| name == s.name().as_str()))
        .cloned()
        .collect();

    for series in untyped {
        let kind = infer_type(&series)?;
        if kind != ColumnType::Text {
            df.with_column(cast_series(&series, kind)?)?;
        }
    }

    Ok(df)
}

fn infer_type(series: &Series) -> Result<ColumnType> {
    let texts: Vec<&str> = series.str()?.into_iter().flatten().map(str::trim).collect();
    Ok(if texts.is_empty() {
        ColumnType::Text
    } else if texts.iter().all(|s| s.parse::<i64>().is_ok()) {
        ColumnType::Integer
    } else if texts.iter().all(|s| s.parse::<f64>().is_ok()) {
        ColumnType::Float
    } else {
        ColumnType::Text
    })
}

/// Upper-cases the content of every text column. Nulls are left alone.
pub fn uppercase_text_values(df: DataFrame) -> Result<DataFrame> {
    let upper: Vec<Series> = df
        .get_columns()
        .iter()
        .map(|c| c.as_materialized_series())
        .filter(|s| s.dtype() == &DataType::String)
        .map(|s| {
            let values: Vec<Option<String>> = s
                .str()?
                .into_iter()
                .map(|v| v.map(str::to_uppercase))
                .collect();
            Ok(Series::new(s.name().clone(), values))
        })
        .collect::<Result<_>>()?;

    let mut df = df;
    for series in upper {
        df.with_column(series)?;
    }
    Ok(df)
}

/// Removes every occurrence of a row that appears more than once.
pub fn drop_duplicate_rows(df: DataFrame) -> Result<DataFrame> {
    Ok(df.unique_stable(None, UniqueKeepStrategy::None, None)?)
}

/// Removes every row whose `key` value is shared with another row.
pub fn drop_duplicate_keys(df: DataFrame, key: &str, source: &str) -> Result<DataFrame> {
    require_column(&df, source, key)?;
    Ok(df.unique_stable(Some(&[key.to_string()][..]), UniqueKeepStrategy::None, None)?)
}

pub fn drop_missing_required(df: DataFrame, required: &[String], source: &str) -> Result<DataFrame> {
    let mut keep = BooleanChunked::full("keep".into(), true, df.height());
    for name in required {
        keep = &keep & &require_column(&df, source, name)?.is_not_null();
    }
    Ok(df.filter(&keep)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::csv_io::read_table;
    use crate::domain::table::{column_names, column_text, has_duplicate_rows};

    fn master(csv: &str) -> DataFrame {
        read_table(csv.as_bytes(), "nmi_info", b',').unwrap()
    }

    #[test]
    fn test_normalize_master_list() {
        let raw = master(
            "nmi,state,interval\n\
             NMI001,nsw,30\n\
             NMI002,vic,15\n\
             NMI002,vic,15\n\
             NMI003,qld,30\n\
             NMI003,sa,30\n\
             NMI004,,30\n\
             NMI005,wa,5\n",
        );

        let df = normalize(raw, &TableSchema::meter_master(), "nmi_info").unwrap();

        assert_eq!(column_names(&df), vec!["NMI", "STATE", "INTERVAL"]);
        // NMI002 is a full duplicate and NMI003 a key duplicate: both copies go.
        assert_eq!(column_text(&df, "NMI"), vec!["NMI001", "NMI005"]);
        assert_eq!(column_text(&df, "STATE"), vec!["NSW", "WA"]);
        assert_eq!(df.column("INTERVAL").unwrap().dtype(), &DataType::Int64);
        assert_eq!(column_text(&df, "INTERVAL"), vec!["30", "5"]);
    }

    #[test]
    fn test_normalize_rejects_non_integer_interval() {
        let raw = master("NMI,STATE,INTERVAL\nNMI001,NSW,half-hourly\n");
        let err = normalize(raw, &TableSchema::meter_master(), "nmi_info").unwrap_err();
        assert!(matches!(err, EtlError::TypeConversionError { ref column, .. } if column == "INTERVAL"));
    }

    #[test]
    fn test_normalize_rejects_interval_beyond_integer_range() {
        let raw = master("NMI,STATE,INTERVAL\nNMI001,NSW,1e30\n");
        let err = normalize(raw, &TableSchema::meter_master(), "nmi_info").unwrap_err();
        assert!(matches!(
            err,
            EtlError::TypeConversionError { ref column, ref value, .. } if column == "INTERVAL" && value == "1e30"
        ));
    }

    #[test]
    fn test_normalize_reports_missing_schema_column() {
        let raw = master("NMI,INTERVAL\nNMI001,30\n");
        let err = normalize(raw, &TableSchema::meter_master(), "nmi_info").unwrap_err();
        assert!(matches!(err, EtlError::UnclassifiedInputError { ref source_name, .. } if source_name == "nmi_info"));
    }

    #[test]
    fn test_normalize_consumption_infers_extra_columns() {
        let raw = read_table(
            b"AESTTime,Quantity,Unit,Channel,Quality\n\
              2022-01-01 00:30:00,1.5,kwh,1,a\n\
              2022-01-01 01:00:00,,kwh,2,b\n\
              ,2.0,kwh,3,c\n",
            "NMI001",
            b',',
        )
        .unwrap();

        let df = normalize(raw, &TableSchema::consumption("AESTTime"), "NMI001").unwrap();

        assert_eq!(
            column_names(&df),
            vec!["AESTTIME", "QUANTITY", "UNIT", "CHANNEL", "QUALITY"]
        );
        assert_eq!(df.height(), 2);
        assert!(matches!(df.column("AESTTIME").unwrap().dtype(), DataType::Datetime(_, _)));
        assert_eq!(df.column("CHANNEL").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("QUALITY").unwrap().dtype(), &DataType::String);
        assert_eq!(column_text(&df, "UNIT"), vec!["KWH", "KWH"]);
        assert_eq!(column_text(&df, "QUANTITY"), vec!["1.5", ""]);
    }

    #[test]
    fn test_duplicate_timestamps_are_dropped_entirely() {
        let raw = read_table(
            b"AESTTIME,QUANTITY,UNIT\n\
              2022-01-01 00:30:00,1.5,KWH\n\
              2022-01-01 00:30:00,1.7,KWH\n\
              2022-01-01 01:00:00,1.6,KWH\n",
            "NMI001",
            b',',
        )
        .unwrap();

        let df = normalize(raw, &TableSchema::consumption("AESTTIME"), "NMI001").unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(column_text(&df, "QUANTITY"), vec!["1.6"]);
    }

    #[test]
    fn test_normalized_table_properties() {
        let raw = master(
            "Nmi,State,Interval\nA,nsw,30\nB,vic,30\nB,vic,30\nC,,30\nD,act,30\nD,tas,30\nE,sa,15\n",
        );
        let df = normalize(raw, &TableSchema::meter_master(), "nmi_info").unwrap();

        assert!(column_names(&df).iter().all(|n| *n == n.to_uppercase()));
        assert!(!has_duplicate_rows(&df).unwrap());
        let mut ids = column_text(&df, "NMI");
        let total = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), total);
        assert_eq!(df.column("NMI").unwrap().null_count(), 0);
        assert_eq!(df.column("STATE").unwrap().null_count(), 0);
    }
}

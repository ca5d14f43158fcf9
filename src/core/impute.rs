use polars::prelude::*;

use crate::domain::table::ColumnType;
use crate::utils::error::Result;

/// Fills or drops missing values column by column, left to right.
///
/// Numeric columns are backward-filled: each null takes the next non-null value
/// below it, and trailing nulls stay null. Any other column with a null has those
/// rows dropped. Each column sees the frame as left by the previous one, so a
/// later drop can remove rows an earlier column already filled.
pub fn impute_missing(df: DataFrame) -> Result<DataFrame> {
    let mut df = df;
    for idx in 0..df.width() {
        let series = df.get_columns()[idx].as_materialized_series().clone();
        if series.null_count() == 0 {
            continue;
        }

        if ColumnType::of(series.dtype()).is_numeric() {
            df.with_column(series.fill_null(FillNullStrategy::Backward(None))?)?;
            tracing::debug!("Backward-filled {}", series.name());
        } else {
            let before = df.height();
            df = df.filter(&series.is_not_null())?;
            tracing::debug!(
                "Dropped {} rows with missing {}",
                before - df.height(),
                series.name()
            );
        }
    }
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::csv_io::read_table;
    use crate::core::normalize::infer_types;
    use crate::domain::table::column_text;

    fn frame(csv: &str) -> DataFrame {
        infer_types(read_table(csv.as_bytes(), "NMI001", b',').unwrap()).unwrap()
    }

    #[test]
    fn test_backward_fill_leaves_trailing_null() {
        let df = DataFrame::new(vec![Column::from(Series::new(
            "QUANTITY".into(),
            &[None, Some(1.0), None, None, Some(2.0), None],
        ))])
        .unwrap();
        let df = impute_missing(df).unwrap();
        assert_eq!(
            column_text(&df, "QUANTITY"),
            vec!["1.0", "1.0", "2.0", "2.0", "2.0", ""]
        );
    }

    #[test]
    fn test_impute_fills_numeric_and_drops_text() {
        let df = impute_missing(frame("QUANTITY,UNIT\n,KWH\n3.0,\n4.0,KWH\n")).unwrap();

        // Row 0 was filled from row 1 before row 1 was dropped for its missing unit.
        assert_eq!(df.height(), 2);
        assert_eq!(column_text(&df, "QUANTITY"), vec!["3.0", "4.0"]);
    }

    #[test]
    fn test_impute_is_sequential_across_columns() {
        // The text column comes first, so its drop happens before the fill and
        // the numeric gap is filled from the surviving row.
        let df = impute_missing(frame("UNIT,QUANTITY\nKWH,\n,3.0\nKWH,4.0\n")).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(column_text(&df, "QUANTITY"), vec!["4.0", "4.0"]);
    }

    #[test]
    fn test_impute_without_nulls_is_identity() {
        let df = frame("QUANTITY\n1.0\n2.0\n");
        assert!(impute_missing(df.clone()).unwrap().equals(&df));
    }
}

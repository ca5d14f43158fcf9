use polars::prelude::*;

use crate::core::units::QUANTITY_COLUMN;
use crate::domain::table::require_column;
use crate::utils::error::Result;

pub const OUTLIER_COLUMN: &str = "OUTLIER";

/// Inclusive bounds outside of which a value counts as an outlier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

/// `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]` over the finite values, or `None` when there are none.
///
/// Quartiles interpolate linearly between closest ranks.
pub fn iqr_bounds(values: &[f64]) -> Option<IqrBounds> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let values = Float64Chunked::from_slice("values".into(), &finite);
    let q1 = values.quantile(0.25, QuantileMethod::Linear).ok().flatten()?;
    let q3 = values.quantile(0.75, QuantileMethod::Linear).ok().flatten()?;

    let iqr = q3 - q1;
    Some(IqrBounds {
        q1,
        q3,
        lower: q1 - 1.5 * iqr,
        upper: q3 + 1.5 * iqr,
    })
}

/// One flag per input value. Missing values are never outliers.
pub fn flag_outliers(values: &[Option<f64>]) -> Vec<bool> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    match iqr_bounds(&present) {
        Some(bounds) => values
            .iter()
            .map(|v| v.is_some_and(|v| bounds.is_outlier(v)))
            .collect(),
        None => vec![false; values.len()],
    }
}

/// Adds the `OUTLIER` column computed from this frame's own `QUANTITY` distribution.
pub fn flag_quantity_outliers(df: DataFrame, source: &str) -> Result<DataFrame> {
    let quantities: Vec<Option<f64>> = require_column(&df, source, QUANTITY_COLUMN)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .collect();
    let flags = flag_outliers(&quantities);

    let flagged = flags.iter().filter(|f| **f).count();
    if flagged > 0 {
        tracing::debug!("Flagged {} outliers in {}", flagged, source);
    }

    let mut df = df;
    df.with_column(Series::new(OUTLIER_COLUMN.into(), flags))?;
    Ok(df)
}

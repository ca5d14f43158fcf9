use polars::prelude::*;

use crate::domain::model::EnergyUnit;
use crate::domain::table::require_column;
use crate::utils::error::{EtlError, Result};

pub const QUANTITY_COLUMN: &str = "QUANTITY";
pub const UNIT_COLUMN: &str = "UNIT";

/// Rescales `QUANTITY` to kilowatt-hours and sets every `UNIT` to KWH.
pub fn convert_to_kwh(df: DataFrame, source: &str) -> Result<DataFrame> {
    let quantities = require_column(&df, source, QUANTITY_COLUMN)?.cast(&DataType::Float64)?;
    let units = require_column(&df, source, UNIT_COLUMN)?;
    let codes = units
        .str()
        .map_err(|_| EtlError::conversion(UNIT_COLUMN, units.dtype(), "energy unit"))?;

    let converted = quantities
        .f64()?
        .into_iter()
        .zip(codes)
        .map(|(quantity, code)| {
            let unit: EnergyUnit = match code {
                Some(code) => code.parse()?,
                None => return Err(EtlError::conversion(UNIT_COLUMN, "", "energy unit")),
            };
            Ok(quantity.map(|q| unit.to_kwh(q)))
        })
        .collect::<Result<Vec<Option<f64>>>>()?;

    let height = df.height();
    let mut df = df;
    df.with_column(Series::new(QUANTITY_COLUMN.into(), converted))?;
    df.with_column(Series::new(
        UNIT_COLUMN.into(),
        vec![EnergyUnit::Kwh.code(); height],
    ))?;
    Ok(df)
}

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use polars::prelude::{DataFrame, NamedFrom, Series};

use crate::domain::model::Region;
use crate::domain::table::{require_column, timestamp_values, OFFSET_TIMESTAMP_FORMAT};
use crate::utils::error::Result;

/// Source extracts are recorded in AEST, UTC+10 all year round.
pub const SOURCE_UTC_OFFSET_HOURS: i64 = 10;

pub fn region_timezone(region: Region) -> Tz {
    match region {
        Region::Vic => chrono_tz::Australia::Melbourne,
        Region::Nsw => chrono_tz::Australia::Sydney,
        Region::Sa => chrono_tz::Australia::Adelaide,
        Region::Wa => chrono_tz::Australia::Perth,
        Region::Tas => chrono_tz::Australia::Hobart,
        Region::Qld => chrono_tz::Australia::Brisbane,
        Region::Act => chrono_tz::Australia::Sydney,
    }
}

/// The instant `source` (AEST wall clock) expressed in the region's civil time.
pub fn localize(source: NaiveDateTime, region: Region) -> DateTime<FixedOffset> {
    let utc = source - TimeDelta::hours(SOURCE_UTC_OFFSET_HOURS);
    region_timezone(region).from_utc_datetime(&utc).fixed_offset()
}

/// Inverse of [`localize`]: back to the AEST wall clock.
pub fn to_source(local: DateTime<FixedOffset>) -> NaiveDateTime {
    local.naive_utc() + TimeDelta::hours(SOURCE_UTC_OFFSET_HOURS)
}

pub fn localized_column_name(column: &str) -> String {
    format!("TRANSFORMED_{}", column)
}

/// Adds `TRANSFORMED_<column>` holding each timestamp in the region's local time,
/// written with its UTC offset.
pub fn localize_column(df: DataFrame, column: &str, region: Region, source: &str) -> Result<DataFrame> {
    let local: Vec<Option<String>> = timestamp_values(require_column(&df, source, column)?)?
        .into_iter()
        .map(|ts| ts.map(|ts| localize(ts, region).format(OFFSET_TIMESTAMP_FORMAT).to_string()))
        .collect();

    let mut df = df;
    df.with_column(Series::new(localized_column_name(column).into(), local))?;
    Ok(df)
}

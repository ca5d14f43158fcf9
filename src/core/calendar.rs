use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};
use polars::prelude::{DataFrame, NamedFrom, Series};

use crate::domain::table::{require_column, ColumnType, OFFSET_TIMESTAMP_FORMAT};
use crate::utils::error::{EtlError, Result};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Date and time attributes derived from a local wall-clock timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarFeatures {
    pub date: String,
    pub year: i32,
    pub day_of_year: u32,
    pub month: u32,
    pub month_name: &'static str,
    pub iso_week: u32,
    pub day: u32,
    pub day_name: &'static str,
    pub hour: u32,
    pub minute: u32,
    /// Monday = 0 .. Sunday = 6.
    pub weekday: u32,
    pub is_weekend: bool,
    pub time_of_day: String,
    pub month_day: String,
    pub hour_minute: String,
    pub session: u8,
    pub season: u8,
}

impl CalendarFeatures {
    pub fn from_datetime(ts: NaiveDateTime) -> Self {
        let weekday = ts.weekday().num_days_from_monday();
        Self {
            date: ts.format("%Y-%m-%d").to_string(),
            year: ts.year(),
            day_of_year: ts.ordinal(),
            month: ts.month(),
            month_name: MONTH_NAMES[ts.month0() as usize],
            iso_week: ts.iso_week().week(),
            day: ts.day(),
            day_name: DAY_NAMES[weekday as usize],
            hour: ts.hour(),
            minute: ts.minute(),
            weekday,
            is_weekend: weekday >= 5,
            time_of_day: ts.format("%H:%M:%S").to_string(),
            month_day: ts.format("%m-%d").to_string(),
            hour_minute: ts.format("%H:%M").to_string(),
            session: session_bucket(ts.hour()),
            season: season(ts.month()),
        }
    }

    fn values(&self) -> [FeatureValue; 17] {
        use FeatureValue::{Flag, Number, Text};
        [
            Text(self.date.clone()),
            Number(self.year.into()),
            Number(self.day_of_year.into()),
            Number(self.month.into()),
            Text(self.month_name.to_string()),
            Number(self.iso_week.into()),
            Number(self.day.into()),
            Text(self.day_name.to_string()),
            Number(self.hour.into()),
            Number(self.minute.into()),
            Number(self.weekday.into()),
            Flag(self.is_weekend),
            Text(self.time_of_day.clone()),
            Text(self.month_day.clone()),
            Text(self.hour_minute.clone()),
            Number(self.session.into()),
            Number(self.season.into()),
        ]
    }
}

enum FeatureValue {
    Text(String),
    Number(i64),
    Flag(bool),
}

fn feature_series(name: &str, kind: ColumnType, values: Vec<Option<FeatureValue>>) -> Series {
    match kind {
        ColumnType::Integer => {
            let numbers: Vec<Option<i64>> = values
                .into_iter()
                .map(|v| match v {
                    Some(FeatureValue::Number(n)) => Some(n),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), numbers)
        }
        ColumnType::Boolean => {
            let flags: Vec<Option<bool>> = values
                .into_iter()
                .map(|v| match v {
                    Some(FeatureValue::Flag(b)) => Some(b),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), flags)
        }
        _ => {
            let texts: Vec<Option<String>> = values
                .into_iter()
                .map(|v| match v {
                    Some(FeatureValue::Text(s)) => Some(s),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), texts)
        }
    }
}

/// Output columns, in the order [`CalendarFeatures`] fills them.
pub const FEATURE_COLUMNS: [(&str, ColumnType); 17] = [
    ("DATE", ColumnType::Text),
    ("YEAR", ColumnType::Integer),
    ("YEARDAY", ColumnType::Integer),
    ("MONTH", ColumnType::Integer),
    ("MONTHNAME", ColumnType::Text),
    ("WEEK", ColumnType::Integer),
    ("DAY", ColumnType::Integer),
    ("DAYNAME", ColumnType::Text),
    ("HOUR", ColumnType::Integer),
    ("MINUTE", ColumnType::Integer),
    ("WEEKDAY", ColumnType::Integer),
    ("WEEKEND", ColumnType::Boolean),
    ("TIME", ColumnType::Text),
    ("MONTHDAY", ColumnType::Text),
    ("HOURMINUTE", ColumnType::Text),
    ("SESSION", ColumnType::Integer),
    ("SEASON", ColumnType::Integer),
];

/// Six 4-hour buckets: `[0,4)` is 1 through `[20,24)` is 6.
pub fn session_bucket(hour: u32) -> u8 {
    (hour.min(23) / 4) as u8 + 1
}

/// 1 = Mar-May, 2 = Jun-Aug, 3 = Sep-Nov, 4 = Dec-Feb.
pub fn season(month: u32) -> u8 {
    match month {
        3..=5 => 1,
        6..=8 => 2,
        9..=11 => 3,
        _ => 4,
    }
}

/// Appends the calendar feature columns derived from `column`'s local wall clock.
///
/// `column` holds offset timestamps as written by the timezone stage.
pub fn add_calendar_features(df: DataFrame, column: &str, source: &str) -> Result<DataFrame> {
    let series = require_column(&df, source, column)?;
    let stamps = series
        .str()
        .map_err(|_| EtlError::conversion(column, series.dtype(), "timestamp with offset"))?;

    let mut columns: Vec<Vec<Option<FeatureValue>>> =
        (0..FEATURE_COLUMNS.len()).map(|_| Vec::with_capacity(df.height())).collect();
    for stamp in stamps {
        let features = match stamp {
            Some(s) => DateTime::parse_from_str(s, OFFSET_TIMESTAMP_FORMAT)
                .map(|ts| CalendarFeatures::from_datetime(ts.naive_local()))
                .map_err(|_| EtlError::conversion(column, s, "timestamp with offset"))?
                .values()
                .map(Some),
            None => std::array::from_fn(|_| None),
        };
        for (values, value) in columns.iter_mut().zip(features) {
            values.push(value);
        }
    }

    let mut df = df;
    for ((name, kind), values) in FEATURE_COLUMNS.iter().zip(columns) {
        df.with_column(feature_series(name, *kind, values))?;
    }
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::column_text;
    use chrono::NaiveDate;
    use polars::prelude::{Column, DataType};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_session_bucket_is_total_and_contiguous() {
        let buckets: Vec<u8> = (0..24).map(session_bucket).collect();
        assert_eq!(buckets[0], 1);
        assert_eq!(buckets[3], 1);
        assert_eq!(buckets[4], 2);
        assert_eq!(buckets[23], 6);
        for bucket in 1..=6u8 {
            assert_eq!(buckets.iter().filter(|b| **b == bucket).count(), 4);
        }
        assert!(buckets.windows(2).all(|w| w[1] == w[0] || w[1] == w[0] + 1));
    }

    #[test]
    fn test_season_uses_month_sets() {
        let seasons: Vec<u8> = (1..=12).map(season).collect();
        assert_eq!(seasons, vec![4, 4, 1, 1, 1, 2, 2, 2, 3, 3, 3, 4]);
    }

    #[test]
    fn test_features_for_new_year_saturday() {
        let f = CalendarFeatures::from_datetime(at(2022, 1, 1, 1, 30));
        assert_eq!(f.date, "2022-01-01");
        assert_eq!(f.year, 2022);
        assert_eq!(f.day_of_year, 1);
        assert_eq!(f.month_name, "January");
        // 2022-01-01 falls in ISO week 52 of 2021.
        assert_eq!(f.iso_week, 52);
        assert_eq!(f.day_name, "Saturday");
        assert_eq!(f.weekday, 5);
        assert!(f.is_weekend);
        assert_eq!(f.time_of_day, "01:30:00");
        assert_eq!(f.month_day, "01-01");
        assert_eq!(f.hour_minute, "01:30");
        assert_eq!(f.session, 1);
        assert_eq!(f.season, 4);
    }

    #[test]
    fn test_weekday_is_monday_based() {
        let f = CalendarFeatures::from_datetime(at(2022, 1, 3, 16, 0));
        assert_eq!(f.weekday, 0);
        assert_eq!(f.day_name, "Monday");
        assert!(!f.is_weekend);
        assert_eq!(f.session, 5);
    }

    #[test]
    fn test_add_calendar_features_uses_local_wall_clock() {
        let stamps = Series::new(
            "TRANSFORMED_AESTTIME".into(),
            &["2022-01-02 00:30:00+11:00", "2022-07-01 12:00:00+10:00"],
        );
        let df = DataFrame::new(vec![Column::from(stamps)]).unwrap();

        let df = add_calendar_features(df, "TRANSFORMED_AESTTIME", "NMI001").unwrap();

        assert_eq!(df.width(), 1 + FEATURE_COLUMNS.len());
        assert_eq!(column_text(&df, "DATE"), vec!["2022-01-02", "2022-07-01"]);
        assert_eq!(column_text(&df, "HOUR"), vec!["0", "12"]);
        assert_eq!(column_text(&df, "WEEKEND"), vec!["1", "0"]);
        assert_eq!(column_text(&df, "SEASON"), vec!["4", "2"]);
        assert_eq!(df.column("MONTH").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_add_calendar_features_rejects_unparseable_stamp() {
        let stamps = Series::new("TRANSFORMED_AESTTIME".into(), &["yesterday"]);
        let df = DataFrame::new(vec![Column::from(stamps)]).unwrap();
        assert!(matches!(
            add_calendar_features(df, "TRANSFORMED_AESTTIME", "NMI001"),
            Err(EtlError::TypeConversionError { .. })
        ));
    }
}

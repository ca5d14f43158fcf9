pub mod calendar;
pub mod etl;
pub mod impute;
pub mod normalize;
pub mod outlier;
pub mod pipeline;
pub mod registry;
pub mod timezone;
pub mod units;

pub use crate::domain::model::{EnergyUnit, MeterRecord, Region};
pub use crate::domain::ports::{ConfigProvider, Storage};
pub use crate::domain::table::ColumnType;
pub use crate::utils::error::Result;

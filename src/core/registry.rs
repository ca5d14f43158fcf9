use std::collections::HashMap;
use std::path::Path;

use polars::prelude::DataFrame;

use crate::adapters::csv_io;
use crate::core::normalize::{cast_columns, uppercase_column_names, TableSchema};
use crate::domain::model::{MeterRecord, Region};
use crate::domain::ports::Storage;
use crate::domain::table::require_column;
use crate::utils::error::{EtlError, Result};

const SOURCE: &str = "registry";

/// Read-only snapshot of the transformed master list, loaded once per batch.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    meters: HashMap<String, MeterRecord>,
    /// Meters whose STATE is not a known region, kept so lookups can say why they fail.
    unknown_regions: HashMap<String, String>,
}

impl Registry {
    pub fn from_records(records: impl IntoIterator<Item = MeterRecord>) -> Self {
        Self {
            meters: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
            unknown_regions: HashMap::new(),
        }
    }

    /// Builds the registry from a `NMI,STATE,INTERVAL` frame.
    pub fn from_table(df: &DataFrame) -> Result<Self> {
        let df = cast_columns(
            uppercase_column_names(df.clone())?,
            &TableSchema::meter_master(),
            SOURCE,
        )?;
        let ids = require_column(&df, SOURCE, "NMI")?.str()?;
        let states = require_column(&df, SOURCE, "STATE")?.str()?;
        let intervals = require_column(&df, SOURCE, "INTERVAL")?.i64()?;

        let mut registry = Registry::default();
        for ((id, code), minutes) in ids.into_iter().zip(states).zip(intervals) {
            let (Some(id), Some(code)) = (id, code) else {
                continue;
            };
            let expected_interval_minutes =
                minutes.ok_or_else(|| EtlError::conversion("INTERVAL", "", "integer"))?;

            match code.parse::<Region>() {
                Ok(region) => {
                    registry.meters.insert(
                        id.to_string(),
                        MeterRecord {
                            id: id.to_string(),
                            region,
                            expected_interval_minutes,
                        },
                    );
                }
                Err(_) => {
                    tracing::warn!("Meter {} has unknown region '{}'", id, code);
                    registry.unknown_regions.insert(id.to_string(), code.to_string());
                }
            }
        }
        Ok(registry)
    }

    pub fn load<S: Storage>(storage: &S, path: &Path) -> Result<Self> {
        let df = csv_io::load_csv(storage, path)?;
        let registry = Self::from_table(&df)?;
        tracing::info!(
            "Loaded registry with {} meters from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    pub fn contains(&self, meter_id: &str) -> bool {
        self.meters.contains_key(meter_id) || self.unknown_regions.contains_key(meter_id)
    }

    pub fn get(&self, meter_id: &str) -> Option<&MeterRecord> {
        self.meters.get(meter_id)
    }

    pub fn region_of(&self, meter_id: &str) -> Result<Region> {
        if let Some(record) = self.meters.get(meter_id) {
            return Ok(record.region);
        }
        match self.unknown_regions.get(meter_id) {
            Some(code) => Err(EtlError::UnknownRegionError { code: code.clone() }),
            None => Err(EtlError::UnresolvedMeterError {
                meter_id: meter_id.to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.meters.len() + self.unknown_regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifiers in ascending order.
    pub fn meter_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .meters
            .keys()
            .chain(self.unknown_regions.keys())
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

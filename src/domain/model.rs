use std::fmt;
use std::str::FromStr;

use crate::utils::error::EtlError;

/// Australian state or territory that decides a meter's local time rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Vic,
    Nsw,
    Sa,
    Wa,
    Tas,
    Qld,
    Act,
}

impl Region {
    pub const ALL: [Region; 7] = [
        Region::Vic,
        Region::Nsw,
        Region::Sa,
        Region::Wa,
        Region::Tas,
        Region::Qld,
        Region::Act,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Region::Vic => "VIC",
            Region::Nsw => "NSW",
            Region::Sa => "SA",
            Region::Wa => "WA",
            Region::Tas => "TAS",
            Region::Qld => "QLD",
            Region::Act => "ACT",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Region::ALL
            .into_iter()
            .find(|r| r.code() == code)
            .ok_or(EtlError::UnknownRegionError {
                code: s.trim().to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyUnit {
    Kwh,
    Mwh,
    Wh,
}

impl EnergyUnit {
    pub fn code(self) -> &'static str {
        match self {
            EnergyUnit::Kwh => "KWH",
            EnergyUnit::Mwh => "MWH",
            EnergyUnit::Wh => "WH",
        }
    }

    /// Converts a quantity in this unit to kilowatt-hours.
    pub fn to_kwh(self, quantity: f64) -> f64 {
        match self {
            EnergyUnit::Kwh => quantity,
            EnergyUnit::Mwh => quantity * 1000.0,
            EnergyUnit::Wh => quantity / 1000.0,
        }
    }
}

impl FromStr for EnergyUnit {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KWH" => Ok(EnergyUnit::Kwh),
            "MWH" => Ok(EnergyUnit::Mwh),
            "WH" => Ok(EnergyUnit::Wh),
            _ => Err(EtlError::conversion("UNIT", s, "energy unit")),
        }
    }
}

/// One row of the meter registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterRecord {
    pub id: String,
    pub region: Region,
    pub expected_interval_minutes: i64,
}

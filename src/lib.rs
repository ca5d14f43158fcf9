pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod inspect;
pub mod utils;

pub use adapters::storage::LocalStorage;
#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::toml_config::TomlConfig;

pub use core::{
    etl::{EtlEngine, EtlReport},
    pipeline::ConsumptionBatch,
};
pub use utils::error::{EtlError, Result};

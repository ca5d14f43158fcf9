use crate::core::pipeline::{transform_consumption, transform_nmi_master, ConsumptionBatch, ConsumptionJob};
use crate::core::{ConfigProvider, Storage};
use crate::utils::error::Result;
use std::path::Path;
use std::time::Instant;

#[derive(Debug)]
pub struct EtlReport {
    /// Meters kept by the master transform, when it ran.
    pub master_meters: Option<usize>,
    pub batch: ConsumptionBatch,
}

pub struct EtlEngine<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> EtlEngine<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    pub fn run(&self) -> Result<EtlReport> {
        let started = Instant::now();
        tracing::info!("Starting ETL process...");

        let master_meters = match self.config.master_file() {
            Some(master_file) => {
                tracing::info!("Transforming master list...");
                let master = transform_nmi_master(
                    &self.storage,
                    Path::new(master_file),
                    Path::new(self.config.output_folder()),
                )?;
                Some(master.height())
            }
            None => None,
        };

        tracing::info!("Transforming consumption data...");
        let job = ConsumptionJob::from_config(&self.config);
        let batch = transform_consumption(&self.storage, &job)?;

        tracing::info!("ETL process finished in {:?}", started.elapsed());
        Ok(EtlReport {
            master_meters,
            batch,
        })
    }
}

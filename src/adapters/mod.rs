// Adapters layer: concrete implementations for external systems (filesystem storage, CSV files).

pub mod csv_io;
pub mod storage;

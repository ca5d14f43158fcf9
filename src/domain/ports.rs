use crate::utils::error::Result;
use std::path::{Path, PathBuf};

pub trait Storage {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;
    fn write_file(&self, path: &Path, data: &[u8]) -> Result<()>;
}

pub trait ConfigProvider {
    /// Raw master list; `None` means the registry already exists at `lookup_file`.
    fn master_file(&self) -> Option<&str>;
    fn consumption_folder(&self) -> &str;
    fn file_pattern(&self) -> &str;
    fn output_folder(&self) -> &str;
    fn consumption_output_folder(&self) -> PathBuf;
    fn lookup_file(&self) -> PathBuf;
    fn timestamp_column(&self) -> &str;
}

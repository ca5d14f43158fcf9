use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Filesystem storage. Relative paths resolve against `base_path` when one is set.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    base_path: Option<PathBuf>,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self { base_path: None }
    }

    pub fn with_base(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: Some(base_path.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Storage for LocalStorage {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let data = fs::read(self.resolve(path))?;
        Ok(data)
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }
}

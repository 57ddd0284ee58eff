use std::path::PathBuf;

use anyhow::{Context, Result};

pub struct StorePaths {
    pub root: PathBuf,
    pub data: PathBuf,
    pub db: PathBuf,
    pub config: PathBuf,
}

impl StorePaths {
    pub fn new() -> Result<Self> {
        let root = std::env::current_dir().context("Failed to get current directory")?;
        Ok(Self::from_root(root))
    }

    pub fn from_root(root: PathBuf) -> Self {
        let data = root.join(".listings");
        Self {
            db: data.join("listings.db"),
            config: data.join("config.yaml"),
            data,
            root,
        }
    }

    pub fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data)
            .with_context(|| format!("Failed to create {}", self.data.display()))
    }
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

pub const DEFAULT_POOL_SIZE: usize = 100;

/// Settings for a [`crate::bufferpool::BufferManager`].
///
/// Missing keys fall back to their defaults, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Number of frames in the pool. Fixed for the manager's lifetime.
    pub pool_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        BufferConfig {
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl BufferConfig {
    pub fn with_pool_size(pool_size: usize) -> Self {
        BufferConfig { pool_size }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: BufferConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(Error::InvalidConfig(
                "pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

use std::path::Path;

use bmt_store::FileStoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{BmtError, BmtResult};

/// Bucket count used by [`compute_root`](crate::compute_root) and
/// [`commit_write_set`](crate::commit_write_set).
///
/// Changing it changes every root, so it is part of the persisted format.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Tunables for building bucket indices and opening stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BmtConfig {
    /// Number of bucket slots.
    pub capacity: usize,
    /// Settings for the file-backed store.
    pub store: FileStoreConfig,
}

impl Default for BmtConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            store: FileStoreConfig::default(),
        }
    }
}

impl BmtConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> BmtResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| BmtError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> BmtResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BmtError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Reject configurations no index can be built from.
    pub fn validate(&self) -> BmtResult<()> {
        if self.capacity == 0 {
            return Err(BmtError::InvalidCapacity(self.capacity));
        }
        Ok(())
    }
}

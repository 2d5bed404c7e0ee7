use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::diagnostics::LogConfig;
use crate::error::{SyncError, SyncResult};
use crate::mode::SyncMode;
use crate::synchronized::READERS_BOUND;

/// Configuration for a [`SynchronizedStore`](crate::SynchronizedStore).
///
/// ```toml
/// mode = "process"
/// path = "/var/lib/app/dbfile.bin"
/// readers = 10
///
/// [log]
/// path = "/var/log/app/shelf.log"
/// level = "info"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Primitive family; every participant on `path` must agree.
    pub mode: SyncMode,
    /// Backing file.
    pub path: PathBuf,
    /// Maximum number of concurrent readers (admission capacity).
    pub readers: usize,
    /// Optional file log sink. Nothing is installed automatically.
    pub log: Option<LogConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::default(),
            path: PathBuf::from(shelf_store::DEFAULT_FILE_NAME),
            readers: READERS_BOUND,
            log: None,
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> SyncResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Reject values no store can be built from.
    pub fn validate(&self) -> SyncResult<()> {
        if self.readers == 0 {
            return Err(SyncError::InvalidCapacity(self.readers));
        }
        Ok(())
    }
}

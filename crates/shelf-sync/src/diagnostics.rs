//! File log sink for store diagnostics.
//!
//! The library only emits `tracing` events (store opened, each mutation,
//! each failure). Nothing here is global: the caller builds a subscriber
//! from a [`LogConfig`] and installs it however it likes, either scoped
//! with `tracing::subscriber::with_default` or process-wide with
//! `tracing::subscriber::set_global_default`.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{Level, Subscriber};

use crate::error::{SyncError, SyncResult};

/// Where and how verbosely to write diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log file, opened in append mode.
    pub path: PathBuf,
    /// Most verbose level written: `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// Emit ANSI colour codes.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("shelf.log"),
            level: "debug".into(),
            ansi: false,
        }
    }
}

impl LogConfig {
    /// Parsed `level`.
    pub fn max_level(&self) -> SyncResult<Level> {
        self.level
            .parse()
            .map_err(|e| SyncError::Config(format!("log level {:?}: {e}", self.level)))
    }

    /// Build a subscriber that appends formatted events to `path`.
    pub fn subscriber(&self) -> SyncResult<impl Subscriber + Send + Sync + 'static> {
        let level = self.max_level()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| SyncError::Config(format!("{}: {e}", parent.display())))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SyncError::Config(format!("{}: {e}", self.path.display())))?;

        Ok(tracing_subscriber::fmt()
            .with_writer(Mutex::new(file))
            .with_ansi(self.ansi)
            .with_max_level(level)
            .finish())
    }
}

//! Error types for synchronized store operations.

use thiserror::Error;

use crate::mode::SyncMode;

/// Errors from the synchronization layer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The mode selector is not one of the two recognized modes.
    #[error("invalid sync mode: {0}")]
    InvalidMode(String),

    /// Reader capacity must be at least one.
    #[error("invalid reader capacity {0}: must be at least 1")]
    InvalidCapacity(usize),

    /// A configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The requested primitive family is not available on this platform.
    #[error("{0} mode is not supported on this platform")]
    Unsupported(SyncMode),

    /// Acquiring or releasing a process-shared lock failed.
    #[error("lock error on {path}: {source}")]
    Lock {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The underlying persisted store failed.
    #[error("store error: {0}")]
    Store(#[from] shelf_store::StoreError),
}

impl SyncError {
    /// Returns `true` for errors raised while building a store, before it
    /// was usable.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidMode(_) | Self::InvalidCapacity(_) | Self::Config(_) | Self::Unsupported(_)
        )
    }
}

/// Convenience type alias for synchronized store operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

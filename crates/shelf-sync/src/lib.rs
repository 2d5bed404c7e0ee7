//! Concurrent access to a shelf backing file.
//!
//! [`SynchronizedStore`] wraps a [`shelf_store::PersistedStore`] with a
//! reader/writer admission protocol so that threads of one process, or
//! separate processes, can share a single backing file without losing
//! updates or reading a file mid-rewrite.
//!
//! # Modules
//!
//! - [`synchronized`] -- the admission protocol and [`SynchronizedStore`]
//! - [`primitives`] -- thread-shared and process-shared primitive families
//! - [`mode`] -- [`SyncMode`] selector
//! - [`config`] -- [`StoreConfig`], loadable from TOML
//! - [`diagnostics`] -- [`LogConfig`], an explicit file log sink
//! - [`error`] -- [`SyncError`]
//!
//! # Example
//!
//! ```no_run
//! use shelf_store::KeyValueStore;
//! use shelf_sync::{SyncMode, SynchronizedStore};
//!
//! let store: SynchronizedStore<String, u64> =
//!     SynchronizedStore::open(SyncMode::Process, "dbfile.bin")?;
//! store.set("visits".into(), 1)?;
//! assert_eq!(store.get(&"visits".to_string())?, Some(1));
//! # Ok::<(), shelf_sync::SyncError>(())
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod mode;
pub mod primitives;
pub mod synchronized;

pub use config::StoreConfig;
pub use diagnostics::LogConfig;
pub use error::{SyncError, SyncResult};
pub use mode::SyncMode;
pub use primitives::Primitives;
pub use synchronized::{ReadView, SynchronizedStore, READERS_BOUND};

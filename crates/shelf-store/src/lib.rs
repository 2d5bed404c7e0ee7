//! File-backed key-value records for shelf.
//!
//! This crate holds the two lower layers of the shelf stack. Neither layer
//! does any concurrency control; `shelf-sync` wraps them with the
//! reader/writer admission protocol.
//!
//! # Layers
//!
//! - [`RecordStore`] -- plain `HashMap` with get/set/delete
//! - [`PersistedStore`] -- reloads the whole mapping from its backing file
//!   before every call and rewrites the whole file after every mutation
//!
//! # Design Rules
//!
//! 1. The backing file is the single source of truth. The in-memory mapping
//!    is rebuilt on every call and never trusted across calls.
//! 2. Mutations rewrite the entire file (no append, no log).
//! 3. Rewrites are atomic: write a temp file, then rename over the target.
//! 4. A missing key is not an error; it is `None`.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod codec;
pub mod error;
pub mod memory;
pub mod persisted;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use codec::{read_snapshot, write_snapshot};
pub use error::{StoreError, StoreResult};
pub use memory::RecordStore;
pub use persisted::{PersistedStore, DEFAULT_FILE_NAME};
pub use traits::{Key, KeyValueStore, Value};

//! Admission primitives behind the reader/writer protocol.
//!
//! A [`Primitives`] backend supplies the three shared objects the protocol
//! is built from -- writer exclusion, writer intent, and a bounded pool of
//! reader admission units -- for one primitive family. The protocol itself
//! lives in [`SynchronizedStore`](crate::SynchronizedStore) and is the same
//! for every family.
//!
//! Every acquisition returns a [`Guard`]; dropping it releases what it holds,
//! including while unwinding from a panic.

use std::fmt::Debug;
use std::path::Path;

use crate::error::{SyncError, SyncResult};
use crate::mode::SyncMode;

#[cfg(unix)]
pub mod process;
pub mod thread;

#[cfg(unix)]
pub use process::ProcessPrimitives;
pub use thread::ThreadPrimitives;

/// Marker for a held primitive. Release happens in `Drop`.
pub trait Held {}

/// Scoped hold on a primitive.
pub type Guard<'a> = Box<dyn Held + 'a>;

/// One primitive family.
///
/// Implementations block without timeout. A holder that never drops its
/// guard stalls every other participant.
pub trait Primitives: Send + Sync + Debug {
    /// Acquire writer exclusion. Only one writer holds it at a time.
    fn exclude_writers(&self) -> SyncResult<Guard<'_>>;

    /// Raise writer intent. Intent is cleared when the guard drops.
    fn raise_intent(&self) -> SyncResult<Guard<'_>>;

    /// Block until no writer intent is raised.
    fn wait_intent_clear(&self) -> SyncResult<()>;

    /// Take one admission unit, blocking while all units are held.
    fn admit(&self) -> SyncResult<Guard<'_>>;

    /// Take every admission unit, blocking until each holder has released.
    fn drain(&self) -> SyncResult<Guard<'_>>;

    /// Total number of admission units.
    fn capacity(&self) -> usize;
}

/// Build the primitive family for `mode`.
///
/// Process primitives are keyed on `path`: every instance built for the
/// same path shares them.
pub fn for_mode(mode: SyncMode, path: &Path, capacity: usize) -> SyncResult<Box<dyn Primitives>> {
    if capacity == 0 {
        return Err(SyncError::InvalidCapacity(capacity));
    }
    match mode {
        SyncMode::Thread => Ok(Box::new(ThreadPrimitives::new(capacity))),
        #[cfg(unix)]
        SyncMode::Process => Ok(Box::new(ProcessPrimitives::open(path, capacity)?)),
        #[cfg(not(unix))]
        SyncMode::Process => {
            let _ = path;
            Err(SyncError::Unsupported(mode))
        }
    }
}

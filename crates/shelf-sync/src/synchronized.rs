//! The reader/writer admission protocol.
//!
//! Read path:
//! 1. wait until writer intent is clear
//! 2. take one admission unit (at most `capacity` readers run at once)
//! 3. run the read against the persisted store
//! 4. give the unit back
//!
//! Write path:
//! 1. take writer exclusion
//! 2. raise writer intent (new readers stop at read step 1)
//! 3. drain every admission unit (waits out readers already admitted)
//! 4. run the full reload-mutate-rewrite cycle
//! 5. return the units
//! 6. clear writer intent
//! 7. release writer exclusion
//!
//! Steps 4-7 and read step 4 run on every exit path, including errors and
//! panics, because each hold is a guard released on drop.
//!
//! Readers are not counted. Writers always drain the full capacity, so a
//! writer cannot start while any admitted reader is still inside step 3.
//! All writers are serialized, whether or not their keys overlap. Nothing
//! times out: a holder that never returns stalls every other participant.

use std::path::Path;

use tracing::{error, info, trace};

use shelf_store::{Key, KeyValueStore, PersistedStore, StoreResult, Value};

use crate::config::StoreConfig;
use crate::error::{SyncError, SyncResult};
use crate::mode::SyncMode;
use crate::primitives::{self, Guard, Primitives};

/// Default maximum number of concurrent readers.
pub const READERS_BOUND: usize = 10;

/// Holds writer exclusion, writer intent and every admission unit.
///
/// Fields drop in declaration order: units are returned, then intent is
/// cleared, then writer exclusion is released.
struct WriteSection<'a> {
    _admission: Guard<'a>,
    _intent: Guard<'a>,
    _writers: Guard<'a>,
}

impl<'a> WriteSection<'a> {
    fn enter(primitives: &'a dyn Primitives) -> SyncResult<Self> {
        let writers = primitives.exclude_writers()?;
        trace!("writer exclusion held");
        let intent = primitives.raise_intent()?;
        let admission = primitives.drain()?;
        trace!(units = primitives.capacity(), "admission drained");
        Ok(Self {
            _admission: admission,
            _intent: intent,
            _writers: writers,
        })
    }
}

/// Read-only access to the persisted store inside a read section.
pub struct ReadView<'a, K, V> {
    store: &'a PersistedStore<K, V>,
}

impl<K: Key, V: Value> ReadView<'_, K, V> {
    /// Look up `key` in the current file contents.
    pub fn get(&self, key: &K) -> StoreResult<Option<V>> {
        self.store.get(key)
    }

    /// Render the file path and current contents.
    pub fn describe(&self) -> StoreResult<String> {
        self.store.describe()
    }

    /// Path to the backing file.
    pub fn path(&self) -> &Path {
        self.store.path()
    }
}

/// A [`PersistedStore`] safe to share between threads or processes.
///
/// Many readers run at once, up to the admission capacity. A writer runs
/// alone: it excludes other writers, stops new readers and waits for
/// admitted readers to leave before it touches the file.
///
/// In [`SyncMode::Thread`] the primitives live in this instance, so threads
/// must share it (e.g. behind an `Arc`). In [`SyncMode::Process`] they are
/// lock files next to the backing file, so every instance on that path
/// coordinates, in any process.
pub struct SynchronizedStore<K, V> {
    inner: PersistedStore<K, V>,
    primitives: Box<dyn Primitives>,
    mode: SyncMode,
}

impl<K: Key, V: Value> SynchronizedStore<K, V> {
    /// Open the store at `path` with the default reader capacity.
    pub fn open(mode: SyncMode, path: impl AsRef<Path>) -> SyncResult<Self> {
        Self::with_capacity(mode, path, READERS_BOUND)
    }

    /// Open the store at `path` admitting at most `capacity` readers at once.
    ///
    /// The backing file is initialized under the write protocol, so a
    /// concurrent opener never overwrites a committed write with an empty
    /// mapping.
    pub fn with_capacity(
        mode: SyncMode,
        path: impl AsRef<Path>,
        capacity: usize,
    ) -> SyncResult<Self> {
        let path = path.as_ref();
        let primitives = primitives::for_mode(mode, path, capacity)?;

        let inner = {
            let _section = WriteSection::enter(primitives.as_ref())?;
            PersistedStore::open(path)?
        };

        info!(path = %path.display(), %mode, capacity, "store opened");
        Ok(Self {
            inner,
            primitives,
            mode,
        })
    }

    /// Open the store described by `config`.
    pub fn from_config(config: &StoreConfig) -> SyncResult<Self> {
        config.validate()?;
        Self::with_capacity(config.mode, &config.path, config.readers)
    }

    /// Run `f` as a reader.
    ///
    /// Waits for any writer to finish, then occupies one admission unit
    /// until `f` returns.
    pub fn read_with<R>(
        &self,
        f: impl FnOnce(&ReadView<'_, K, V>) -> StoreResult<R>,
    ) -> SyncResult<R> {
        self.primitives.wait_intent_clear()?;
        let _unit = self.primitives.admit()?;
        trace!("reader admitted");

        let view = ReadView { store: &self.inner };
        Ok(f(&view)?)
    }

    /// Run `f` as a writer, with the whole store to itself.
    ///
    /// Several operations inside one `f` form a single atomic step with
    /// respect to every other reader and writer, e.g. a read-modify-write.
    pub fn write_with<R>(
        &self,
        f: impl FnOnce(&PersistedStore<K, V>) -> StoreResult<R>,
    ) -> SyncResult<R> {
        let section = WriteSection::enter(self.primitives.as_ref())?;
        let result = f(&self.inner);
        drop(section);
        trace!("writer released");
        Ok(result?)
    }

    /// The primitive family in use.
    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Maximum number of concurrent readers.
    pub fn capacity(&self) -> usize {
        self.primitives.capacity()
    }

    /// Path to the backing file.
    pub fn path(&self) -> &Path {
        self.inner.path()
    }
}

impl<K: Key, V: Value> KeyValueStore<K, V> for SynchronizedStore<K, V> {
    type Error = SyncError;

    fn set(&self, key: K, value: V) -> SyncResult<bool> {
        logged("set", self.write_with(|store| store.set(key, value)))
    }

    fn get(&self, key: &K) -> SyncResult<Option<V>> {
        logged("get", self.read_with(|view| view.get(key)))
    }

    fn delete(&self, key: &K) -> SyncResult<Option<V>> {
        logged("delete", self.write_with(|store| store.delete(key)))
    }

    fn describe(&self) -> SyncResult<String> {
        logged("describe", self.read_with(|view| view.describe()))
    }
}

impl<K, V> std::fmt::Debug for SynchronizedStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynchronizedStore")
            .field("mode", &self.mode)
            .field("store", &self.inner)
            .field("primitives", &self.primitives)
            .finish()
    }
}

/// Log synchronization failures. Store failures were already logged by the
/// persisted store.
fn logged<R>(op: &'static str, result: SyncResult<R>) -> SyncResult<R> {
    result.inspect_err(|e| {
        if !matches!(e, SyncError::Store(_)) {
            error!(op, error = %e, "synchronized operation failed");
        }
    })
}

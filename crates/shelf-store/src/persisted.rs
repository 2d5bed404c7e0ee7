use std::collections::HashMap;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::codec;
use crate::error::StoreResult;
use crate::memory::RecordStore;
use crate::traits::{Key, KeyValueStore, Value};

/// File name used when the caller does not pick one.
pub const DEFAULT_FILE_NAME: &str = "dbfile.bin";

/// A [`RecordStore`] persisted to a single snapshot file.
///
/// Every call reloads the entire mapping from disk, applies the operation
/// to that transient copy and, for mutations, rewrites the entire file. No
/// state is cached between calls, so several instances (or processes) can
/// point at the same path.
///
/// There is no concurrency control here: two concurrent mutations can each
/// reload, then each rewrite, and one update is silently lost. Wrap the store
/// in `shelf_sync::SynchronizedStore` for shared use.
pub struct PersistedStore<K, V> {
    path: PathBuf,
    _records: PhantomData<fn() -> (K, V)>,
}

impl<K: Key, V: Value> PersistedStore<K, V> {
    /// Open the store at `path`.
    ///
    /// A missing or zero-length file is initialized with an empty mapping.
    /// An existing non-empty file is left untouched and becomes the
    /// starting state.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        if non_zero_file(&path) {
            debug!(path = %path.display(), "previous database content loaded");
        } else {
            codec::write_snapshot::<K, V>(&path, &HashMap::new()).inspect_err(|e| {
                error!(path = %path.display(), error = %e, "failed to initialize database");
            })?;
            debug!(path = %path.display(), "new database initialized");
        }

        Ok(Self {
            path,
            _records: PhantomData,
        })
    }

    /// Path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload the full mapping from the backing file.
    fn load(&self, op: &'static str) -> StoreResult<RecordStore<K, V>> {
        codec::read_snapshot(&self.path)
            .map(RecordStore::from_map)
            .inspect_err(|e| {
                error!(op, path = %self.path.display(), error = %e, "failed to load database");
            })
    }

    /// Rewrite the backing file with `records`.
    fn commit(&self, op: &'static str, records: RecordStore<K, V>) -> StoreResult<()> {
        codec::write_snapshot(&self.path, records.as_map()).inspect_err(|e| {
            error!(op, path = %self.path.display(), error = %e, "failed to persist database");
        })
    }
}

impl<K: Key, V: Value> KeyValueStore<K, V> for PersistedStore<K, V> {
    type Error = crate::error::StoreError;

    fn set(&self, key: K, value: V) -> StoreResult<bool> {
        let mut records = self.load("set")?;
        debug!(key = ?key, "set");
        records.set(key, value);
        self.commit("set", records)?;
        Ok(true)
    }

    fn get(&self, key: &K) -> StoreResult<Option<V>> {
        let records = self.load("get")?;
        Ok(records.into_map().remove(key))
    }

    fn delete(&self, key: &K) -> StoreResult<Option<V>> {
        let mut records = self.load("delete")?;
        let removed = records.delete(key);
        debug!(key = ?key, existed = removed.is_some(), "delete");
        self.commit("delete", records)?;
        Ok(removed)
    }

    fn describe(&self) -> StoreResult<String> {
        let records = self.load("describe")?;
        Ok(format!("{}: {}", self.path.display(), records.describe()))
    }
}

impl<K, V> std::fmt::Debug for PersistedStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedStore")
            .field("path", &self.path)
            .finish()
    }
}

/// Returns `true` if `path` exists and has content.
fn non_zero_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use proptest::prelude::*;

    fn open_in(dir: &tempfile::TempDir) -> PersistedStore<u32, u32> {
        PersistedStore::open(dir.path().join(DEFAULT_FILE_NAME)).unwrap()
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn open_initializes_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir);
        assert!(store.path().exists());

        let loaded: HashMap<u32, u32> = codec::read_snapshot(store.path()).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn open_initializes_zero_length_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        fs::write(&path, b"").unwrap();

        let store: PersistedStore<u32, u32> = PersistedStore::open(&path).unwrap();
        assert_eq!(store.get(&1).unwrap(), None);
    }

    #[test]
    fn open_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeded.bin");
        let seed: HashMap<u32, u32> = (1..=50).map(|n| (n, n * 100)).collect();
        codec::write_snapshot(&path, &seed).unwrap();

        let store: PersistedStore<u32, u32> = PersistedStore::open(&path).unwrap();
        assert_eq!(store.get(&40).unwrap(), Some(4000));
        assert_eq!(codec::read_snapshot::<u32, u32>(&path).unwrap(), seed);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/db.bin");
        let _store: PersistedStore<String, String> = PersistedStore::open(&path).unwrap();
        assert!(path.exists());
    }

    // -----------------------------------------------------------------------
    // Core operations
    // -----------------------------------------------------------------------

    #[test]
    fn get_never_set_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir);
        assert_eq!(store.get(&9).unwrap(), None);
        assert_eq!(store.delete(&9).unwrap(), None);
    }

    #[test]
    fn set_writes_through_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir);
        assert!(store.set(40, 4002).unwrap());

        let loaded: HashMap<u32, u32> = codec::read_snapshot(store.path()).unwrap();
        assert_eq!(loaded.get(&40), Some(&4002));
    }

    #[test]
    fn reload_sees_foreign_writes() {
        let dir = tempfile::tempdir().unwrap();
        let a = open_in(&dir);
        let b = open_in(&dir);

        a.set(1, 10).unwrap();
        assert_eq!(b.get(&1).unwrap(), Some(10));
        b.delete(&1).unwrap();
        assert_eq!(a.get(&1).unwrap(), None);
    }

    #[test]
    fn persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let a: PersistedStore<String, i64> =
                PersistedStore::open(dir.path().join("db.bin")).unwrap();
            a.set("x".into(), 1).unwrap();
        }
        let b: PersistedStore<String, i64> =
            PersistedStore::open(dir.path().join("db.bin")).unwrap();
        assert_eq!(b.get(&"x".to_string()).unwrap(), Some(1));
    }

    #[test]
    fn describe_includes_path_and_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir);
        store.set(7, 700).unwrap();

        let rendered = store.describe().unwrap();
        assert!(rendered.starts_with(&format!("{}: ", store.path().display())));
        assert!(rendered.ends_with("{7: 700}"));
    }

    // -----------------------------------------------------------------------
    // Error propagation
    // -----------------------------------------------------------------------

    #[test]
    fn corrupt_file_fails_every_operation() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir);
        fs::write(store.path(), b"definitely not a snapshot").unwrap();

        assert!(matches!(store.get(&1), Err(StoreError::Corrupt { .. })));
        assert!(matches!(store.set(1, 1), Err(StoreError::Corrupt { .. })));
        assert!(matches!(store.delete(&1), Err(StoreError::Corrupt { .. })));
        assert!(matches!(store.describe(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn removed_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir);
        fs::remove_file(store.path()).unwrap();
        assert!(matches!(store.get(&1), Err(StoreError::Io(_))));
    }

    #[test]
    fn debug_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir);
        let debug = format!("{store:?}");
        assert!(debug.contains("PersistedStore"));
        assert!(debug.contains(DEFAULT_FILE_NAME));
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn set_then_get_returns_value(key in ".{0,16}", value in any::<i64>()) {
            let dir = tempfile::tempdir().unwrap();
            let store: PersistedStore<String, i64> =
                PersistedStore::open(dir.path().join("db.bin")).unwrap();
            store.set(key.clone(), value).unwrap();
            prop_assert_eq!(store.get(&key).unwrap(), Some(value));
        }

        #[test]
        fn delete_returns_value_exactly_once(key in any::<u64>(), value in ".{0,32}") {
            let dir = tempfile::tempdir().unwrap();
            let store: PersistedStore<u64, String> =
                PersistedStore::open(dir.path().join("db.bin")).unwrap();
            store.set(key, value.clone()).unwrap();
            prop_assert_eq!(store.delete(&key).unwrap(), Some(value));
            prop_assert_eq!(store.delete(&key).unwrap(), None);
            prop_assert_eq!(store.get(&key).unwrap(), None);
        }
    }
}

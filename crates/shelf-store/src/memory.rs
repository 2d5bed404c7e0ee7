use std::collections::HashMap;

use crate::traits::Key;

/// In-memory, HashMap-based record store.
///
/// No concurrency control of its own; callers hold it by `&mut` for the
/// duration of a single operation. Key order is not preserved.
pub struct RecordStore<K, V> {
    records: HashMap<K, V>,
}

impl<K: Key, V> RecordStore<K, V> {
    /// Create a new empty record store.
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Wrap an already-loaded mapping.
    pub fn from_map(records: HashMap<K, V>) -> Self {
        Self { records }
    }

    /// Give the mapping back, e.g. for serialization.
    pub fn into_map(self) -> HashMap<K, V> {
        self.records
    }

    /// Borrow the underlying mapping.
    pub fn as_map(&self) -> &HashMap<K, V> {
        &self.records
    }

    /// Insert or overwrite `key`.
    pub fn set(&mut self, key: K, value: V) {
        self.records.insert(key, value);
    }

    /// Look up `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.records.get(key)
    }

    /// Remove `key`, returning the value it held.
    pub fn delete(&mut self, key: &K) -> Option<V> {
        self.records.remove(key)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<K: Key, V: std::fmt::Debug> RecordStore<K, V> {
    /// Render the whole mapping, e.g. `{1: 100, 2: 200}`.
    pub fn describe(&self) -> String {
        format!("{:?}", self.records)
    }
}

impl<K: Key, V> Default for RecordStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for RecordStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("record_count", &self.records.len())
            .finish()
    }
}

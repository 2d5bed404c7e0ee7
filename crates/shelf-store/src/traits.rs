use std::fmt::Debug;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Bounds every record key must satisfy: serializable, hashable, printable.
pub trait Key: Serialize + DeserializeOwned + Eq + Hash + Debug {}

impl<T> Key for T where T: Serialize + DeserializeOwned + Eq + Hash + Debug {}

/// Bounds every record value must satisfy. The store is schema-less.
pub trait Value: Serialize + DeserializeOwned + Debug {}

impl<T> Value for T where T: Serialize + DeserializeOwned + Debug {}

/// A shared key-value store.
///
/// Implemented by every layer that can be handed to other code by shared
/// reference, so the layers can be substituted for one another:
/// - [`PersistedStore`](crate::PersistedStore) (no concurrency control)
/// - `SynchronizedStore` in `shelf-sync` (reader/writer admission)
///
/// A missing key is reported as `Ok(None)`, never as an error.
pub trait KeyValueStore<K, V>: Send + Sync {
    /// Error type for failed operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Store `value` under `key`. Returns `true` once the mapping is committed.
    fn set(&self, key: K, value: V) -> Result<bool, Self::Error>;

    /// Look up the value stored under `key`.
    fn get(&self, key: &K) -> Result<Option<V>, Self::Error>;

    /// Remove `key`, returning the value it held if it existed.
    fn delete(&self, key: &K) -> Result<Option<V>, Self::Error>;

    /// Human-readable rendering of the store identity and its contents.
    fn describe(&self) -> Result<String, Self::Error>;
}

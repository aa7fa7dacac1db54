//! Memoized computation over a caller-supplied store.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Compute a short hash of content for cache keys.
///
/// Useful when the natural key is a normalized blob of text rather than a
/// short identifier.
pub fn content_key(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8]) // First 8 bytes = 16 hex chars
}

/// Storage capability for memoized values.
///
/// Only lookup and insertion are required; eviction, persistence, and
/// synchronization are the implementor's business.
pub trait Store<V> {
    fn get(&self, key: &str) -> Option<&V>;
    fn insert(&mut self, key: String, value: V);
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

impl<V> Store<V> for HashMap<String, V> {
    fn get(&self, key: &str) -> Option<&V> {
        HashMap::get(self, key)
    }

    fn insert(&mut self, key: String, value: V) {
        HashMap::insert(self, key, value);
    }
}

impl<V> Store<V> for BTreeMap<String, V> {
    fn get(&self, key: &str) -> Option<&V> {
        BTreeMap::get(self, key)
    }

    fn insert(&mut self, key: String, value: V) {
        BTreeMap::insert(self, key, value);
    }
}

/// Return the value stored under `key`, computing and storing it on a miss.
///
/// A hit never invokes the producer. On a miss the producer runs exactly
/// once and its result is stored before being returned. Producer errors
/// propagate untouched and nothing is stored, so the next call with the same
/// key tries again. The store is borrowed exclusively for the whole call;
/// sharing one across threads is the caller's synchronization problem.
pub fn get_or_compute<V, S, F>(key: &str, store: &mut S, producer: F) -> Result<V>
where
    V: Clone,
    S: Store<V> + ?Sized,
    F: FnOnce() -> Result<V>,
{
    if let Some(value) = store.get(key) {
        debug!(key, "cache hit");
        return Ok(value.clone());
    }

    debug!(key, "cache miss, computing");
    let value = producer()?;
    store.insert(key.to_string(), value.clone());
    Ok(value)
}

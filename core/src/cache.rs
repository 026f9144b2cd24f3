//! Bounded in-memory cache of fetched responses.
//!
//! # Design
//! Entries are evicted strictly in insertion order: a lookup never refreshes
//! an entry, so this is FIFO rather than LRU. There is no expiry and no way to
//! invalidate; the cache lives exactly as long as the client that owns it.
//! The structure is not synchronized.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use sha2::{Digest, Sha256};
use tracing::debug;

/// Number of responses a client keeps.
pub const DEFAULT_CAPACITY: usize = 50;

/// Cache key for one logical request.
///
/// Hex SHA-256 over the access token, the full URL and `"true"` when the
/// request has no body (`"false"` otherwise).
pub fn cache_key(access_token: &str, url: &str, has_body: bool) -> String {
    let mut hasher = Sha256::new();
    hasher.update(access_token.as_bytes());
    hasher.update(url.as_bytes());
    hasher.update(if has_body { "false" } else { "true" }.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct RequestCache<V> {
    entries: HashMap<String, V>,
    order: VecDeque<String>,
    capacity: usize,
}

impl<V> RequestCache<V> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn lookup(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Store `value` under `key` and return a reference to it.
    ///
    /// Overwriting an existing key keeps its place in the eviction order.
    /// Inserting a new key into a full cache first evicts the oldest entry.
    pub fn insert(&mut self, key: String, value: V) -> &V {
        if !self.entries.contains_key(&key) {
            if self.entries.len() >= self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                    debug!(key = %oldest, "evicted oldest cached response");
                }
            }
            self.order.push_back(key.clone());
        }
        match self.entries.entry(key) {
            Entry::Occupied(mut slot) => {
                slot.insert(value);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(value),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<V> Default for RequestCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

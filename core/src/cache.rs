//! Pluggable document cache.
//!
//! The client only ever talks to the [`Cache`] trait; storage and eviction
//! belong to the implementation. [`MemoryCache`] is provided for callers
//! that just want a process-local map.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde_json::Value;

/// Cache capability keyed by `(vault_id, item_id)`.
///
/// Implementations must tolerate concurrent use if the same cache is shared
/// between clients on several threads; the client adds no locking of its
/// own.
pub trait Cache: Send + Sync {
    fn get(&self, vault_id: &str, item_id: &str) -> Option<Value>;

    /// Store `value`, or tombstone the entry when `value` is `None`.
    fn set(&self, vault_id: &str, item_id: &str, value: Option<Value>);

    fn delete(&self, vault_id: &str, item_id: &str) {
        self.set(vault_id, item_id, None);
    }
}

struct Entry {
    value: Value,
    stored_at: Instant,
}

/// In-process cache with optional time-to-live.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Option<Duration>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries older than `ttl` are treated as absent.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::default(),
            ttl: Some(ttl),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(vault_id: &str, item_id: &str) -> String {
        format!("{vault_id}:{item_id}")
    }

    fn is_fresh(&self, entry: &Entry) -> bool {
        self.ttl.map_or(true, |ttl| entry.stored_at.elapsed() < ttl)
    }
}

impl Cache for MemoryCache {
    fn get(&self, vault_id: &str, item_id: &str) -> Option<Value> {
        let entries = self.entries.read().ok()?;
        entries
            .get(&Self::key(vault_id, item_id))
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.value.clone())
    }

    fn set(&self, vault_id: &str, item_id: &str, value: Option<Value>) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        let key = Self::key(vault_id, item_id);
        match value {
            Some(value) => {
                entries.insert(
                    key,
                    Entry {
                        value,
                        stored_at: Instant::now(),
                    },
                );
            }
            None => {
                entries.remove(&key);
            }
        }
    }
}

//! Shared response cache.
//!
//! The cache itself is a thin keyed map; the interesting part is the
//! invalidation contract: every credential mutation clears it before the
//! mutating call returns, so a cached listing can never be older than the
//! most recent write. Manual invalidation by key substring is exposed for
//! the `/api/clearCache` endpoint and reports which keys were removed.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Mutex-guarded response cache keyed by request path (or any caller key).
#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached response.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Store a response under `key`, replacing any previous entry.
    pub fn put(&self, key: &str, value: Value) {
        self.entries.lock().unwrap().insert(key.to_string(), value);
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let n = entries.len();
        entries.clear();
        if n > 0 {
            tracing::debug!("cache cleared ({n} entries)");
        }
        n
    }

    /// Drop entries whose key contains `fragment`, reporting the removed keys.
    pub fn invalidate_matching(&self, fragment: &str) -> Vec<String> {
        let mut entries = self.entries.lock().unwrap();
        let keys: Vec<String> = entries
            .keys()
            .filter(|k| k.contains(fragment))
            .cloned()
            .collect();
        for key in &keys {
            entries.remove(key);
        }
        if !keys.is_empty() {
            tracing::debug!("cache invalidated {} key(s) matching '{fragment}'", keys.len());
        }
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Credential store — the source of truth for "is this user logged in".
//!
//! One record per user, overwritten wholesale on re-save. Every mutation
//! invalidates the shared response cache before returning, so a listing
//! endpoint guarded by the cache can never serve a pre-mutation snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use autorelay_core::error::{AutorelayError, Result};

use crate::cache::ResponseCache;

/// A stored session credential for one user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub user_id: String,
    pub token: String,
    pub saved_at: DateTime<Utc>,
}

/// Mutex-guarded map of user id -> credential, coupled to the response cache.
pub struct CredentialStore {
    records: Mutex<HashMap<String, CredentialRecord>>,
    cache: Arc<ResponseCache>,
}

impl CredentialStore {
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            cache,
        }
    }

    /// Insert or overwrite the credential for `user_id`, stamped now.
    /// Rejects empty fields without touching existing state.
    pub fn save(&self, user_id: &str, token: &str) -> Result<()> {
        if user_id.trim().is_empty() || token.trim().is_empty() {
            return Err(AutorelayError::InvalidInput(
                "userId and token are required".into(),
            ));
        }
        let record = CredentialRecord {
            user_id: user_id.to_string(),
            token: token.to_string(),
            saved_at: Utc::now(),
        };
        self.records
            .lock()
            .unwrap()
            .insert(user_id.to_string(), record);
        self.cache.clear();
        tracing::info!("credential saved for user {user_id}");
        Ok(())
    }

    /// Snapshot of all current records. Order unspecified.
    pub fn list(&self) -> Vec<CredentialRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    /// Remove the credential for `user_id` if present. Idempotent.
    pub fn delete(&self, user_id: &str) {
        let removed = self.records.lock().unwrap().remove(user_id).is_some();
        self.cache.clear();
        if removed {
            tracing::info!("credential deleted for user {user_id}");
        }
    }

    /// Remove every credential.
    pub fn clear_all(&self) {
        let n = {
            let mut records = self.records.lock().unwrap();
            let n = records.len();
            records.clear();
            n
        };
        self.cache.clear();
        tracing::info!("cleared {n} credential(s)");
    }

    /// Internal lookup used by job start and each workflow tick.
    pub fn get(&self, user_id: &str) -> Option<CredentialRecord> {
        self.records.lock().unwrap().get(user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (CredentialStore, Arc<ResponseCache>) {
        let cache = Arc::new(ResponseCache::new());
        (CredentialStore::new(cache.clone()), cache)
    }

    #[test]
    fn save_rejects_empty_fields() {
        let (store, _) = store();
        assert!(matches!(
            store.save("", "tok"),
            Err(AutorelayError::InvalidInput(_))
        ));
        assert!(matches!(
            store.save("u1", "  "),
            Err(AutorelayError::InvalidInput(_))
        ));
        assert!(store.list().is_empty());
    }

    #[test]
    fn save_overwrites_wholesale() {
        let (store, _) = store();
        store.save("u1", "old").unwrap();
        store.save("u1", "new").unwrap();
        let records = store.list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].token, "new");
    }

    #[test]
    fn list_reflects_operation_sequence() {
        let (store, _) = store();
        store.save("u1", "t1").unwrap();
        store.save("u2", "t2").unwrap();
        store.delete("u1");
        store.save("u3", "t3").unwrap();

        let mut ids: Vec<String> = store.list().into_iter().map(|r| r.user_id).collect();
        ids.sort();
        assert_eq!(ids, vec!["u2", "u3"]);

        store.clear_all();
        assert!(store.list().is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let (store, _) = store();
        store.delete("ghost");
        store.delete("ghost");
        assert!(store.get("ghost").is_none());
    }

    #[test]
    fn mutations_invalidate_cache() {
        let (store, cache) = store();
        cache.put("/api/getLogins", json!({"stale": true}));
        store.save("u1", "t1").unwrap();
        assert!(cache.get("/api/getLogins").is_none());

        cache.put("/api/getLogins", json!({"stale": true}));
        store.delete("u1");
        assert!(cache.get("/api/getLogins").is_none());

        cache.put("/api/getLogins", json!({"stale": true}));
        store.clear_all();
        assert!(cache.get("/api/getLogins").is_none());
    }

    #[test]
    fn record_serializes_camel_case() {
        let (store, _) = store();
        store.save("u1", "t1").unwrap();
        let v = serde_json::to_value(&store.list()[0]).unwrap();
        assert_eq!(v["userId"], "u1");
        assert_eq!(v["token"], "t1");
        assert!(v.get("savedAt").is_some());
    }
}

// src/store/memory.rs

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::store::{Document, RecordStore, StoreError, matches_filter, require_object};

/// In-memory record store used by tests and local development.
///
/// A single lock serializes every operation, which trivially satisfies the
/// per-key write-serialization contract. Insertion order is preserved per
/// collection so `find` results are deterministic.
pub struct MemoryRecordStore {
    inner: Mutex<Inner>,
}

struct Inner {
    collections: HashMap<String, Vec<Document>>,
    next_id: u64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                collections: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn find(&self, collection: &str, filter: &Value) -> Result<Vec<Document>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| matches_filter(&d.data, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(&self, collection: &str, data: Value) -> Result<Document, StoreError> {
        require_object(&data)?;
        let mut inner = self.lock()?;
        let id = inner.next_id.to_string();
        inner.next_id += 1;
        let now = Utc::now();
        let doc = Document {
            id,
            created_at: now,
            updated_at: now,
            data,
        };
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn put(&self, collection: &str, id: &str, data: Value) -> Result<Document, StoreError> {
        require_object(&data)?;
        let mut inner = self.lock()?;
        let now = Utc::now();
        let docs = inner.collections.entry(collection.to_string()).or_default();
        if let Some(existing) = docs.iter_mut().find(|d| d.id == id) {
            existing.data = data;
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let doc = Document {
            id: id.to_string(),
            created_at: now,
            updated_at: now,
            data,
        };
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> Result<Option<Document>, StoreError> {
        require_object(&patch)?;
        let mut inner = self.lock()?;
        let Some(doc) = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
        else {
            return Ok(None);
        };
        if let (Some(data), Some(patch)) = (doc.data.as_object_mut(), patch.as_object()) {
            for (key, value) in patch {
                data.insert(key.clone(), value.clone());
            }
        }
        doc.updated_at = Utc::now();
        Ok(Some(doc.clone()))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let Some(docs) = inner.collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|d| d.id != id);
        Ok(docs.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let store = MemoryRecordStore::new();
        let a = store.create("users", json!({"name": "Ada"})).await.unwrap();
        let b = store.create("users", json!({"name": "Bob"})).await.unwrap();
        assert_eq!(a.id, "1");
        assert_eq!(b.id, "2");
    }

    #[tokio::test]
    async fn find_matches_on_equality() {
        let store = MemoryRecordStore::new();
        store
            .create("email_templates", json!({"type": "completion", "subject": "a"}))
            .await
            .unwrap();
        store
            .create("email_templates", json!({"type": "attempt", "subject": "b"}))
            .await
            .unwrap();
        store
            .create("email_templates", json!({"type": "completion", "subject": "c"}))
            .await
            .unwrap();

        let found = store
            .find("email_templates", &json!({"type": "completion"}))
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        // Insertion order: the first match is the oldest record.
        assert_eq!(found[0].data["subject"], "a");
    }

    #[tokio::test]
    async fn put_replaces_and_preserves_created_at() {
        let store = MemoryRecordStore::new();
        let first = store
            .put("progress", "s1_c1", json!({"examAttempts": 1}))
            .await
            .unwrap();
        let second = store
            .put("progress", "s1_c1", json!({"examAttempts": 2}))
            .await
            .unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.data["examAttempts"], 2);

        let all = store.find("progress", &json!({})).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn update_merges_top_level_keys() {
        let store = MemoryRecordStore::new();
        let doc = store
            .create("users", json!({"name": "Ada", "email": "ada@example.com"}))
            .await
            .unwrap();
        let patched = store
            .update("users", &doc.id, json!({"name": "Ada L."}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(patched.data["name"], "Ada L.");
        assert_eq!(patched.data["email"], "ada@example.com");

        let missing = store.update("users", "999", json!({"name": "x"})).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn rejects_non_object_payloads() {
        let store = MemoryRecordStore::new();
        let err = store.create("users", json!([1, 2, 3])).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let store = MemoryRecordStore::new();
        let doc = store.create("users", json!({"name": "Ada"})).await.unwrap();
        assert!(store.delete("users", &doc.id).await.unwrap());
        assert!(!store.delete("users", &doc.id).await.unwrap());
    }
}

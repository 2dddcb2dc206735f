// src/store/mod.rs

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

/// Collection names used by the pipeline.
pub mod collections {
    pub const QUIZZES: &str = "quizzes";
    pub const USERS: &str = "users";
    pub const COURSES: &str = "courses";
    pub const EXAM_RESULTS: &str = "exam_results";
    pub const PROGRESS: &str = "progress";
    pub const CERTIFICATES: &str = "certificates";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const EMAIL_TEMPLATES: &str = "email_templates";
}

/// A stored record: caller payload plus store-stamped identity and
/// timestamps. The payload is always a JSON object.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub data: Value,
}

impl Document {
    /// Deserializes the payload into a typed model.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.data.clone()).map_err(|e| StoreError::Corrupt {
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug)]
pub enum StoreError {
    /// The backend failed; retryable at a higher layer.
    Backend(String),
    /// The caller handed over something that is not a JSON object.
    InvalidDocument(String),
    /// A stored payload no longer matches its model.
    Corrupt { id: String, reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(msg) => write!(f, "record store backend error: {}", msg),
            StoreError::InvalidDocument(msg) => write!(f, "invalid document: {}", msg),
            StoreError::Corrupt { id, reason } => {
                write!(f, "corrupt record '{}': {}", id, reason)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Collection/id keyed document storage.
///
/// The concrete backend is chosen at process start and injected as a trait
/// object; nothing in the pipeline reaches for a global store. Backends
/// must serialize writes to the same (collection, id) key — the progress
/// aggregator's read-modify-write depends on it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetches one record by id.
    async fn get_by_id(&self, collection: &str, id: &str)
    -> Result<Option<Document>, StoreError>;

    /// Returns records whose payload matches every key in `filter`
    /// (top-level equality). Results come back in insertion order.
    async fn find(&self, collection: &str, filter: &Value) -> Result<Vec<Document>, StoreError>;

    /// Inserts a record under a store-assigned id and stamps timestamps.
    async fn create(&self, collection: &str, data: Value) -> Result<Document, StoreError>;

    /// Creates or replaces the record under a caller-chosen id, atomically
    /// per key. Used for composite-keyed records such as progress.
    async fn put(&self, collection: &str, id: &str, data: Value) -> Result<Document, StoreError>;

    /// Merges `patch` (top-level keys) into an existing record.
    /// Returns `None` when the record does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> Result<Option<Document>, StoreError>;

    /// Removes a record. Returns whether anything was deleted.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}

pub(crate) fn require_object(data: &Value) -> Result<(), StoreError> {
    if data.is_object() {
        Ok(())
    } else {
        Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            match data {
                Value::Null => "null",
                Value::Bool(_) => "a boolean",
                Value::Number(_) => "a number",
                Value::String(_) => "a string",
                Value::Array(_) => "an array",
                Value::Object(_) => unreachable!(),
            }
        )))
    }
}

pub(crate) fn matches_filter(data: &Value, filter: &Value) -> bool {
    match (data.as_object(), filter.as_object()) {
        (Some(data), Some(filter)) => filter.iter().all(|(k, v)| data.get(k) == Some(v)),
        _ => false,
    }
}

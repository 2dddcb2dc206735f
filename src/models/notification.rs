// src/models/notification.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification kind, selected from the grading outcome.
pub const TYPE_COMPLETION: &str = "completion";
pub const TYPE_ATTEMPT: &str = "attempt";

/// Represents a document in the 'notifications' collection.
///
/// Append-only log entry; there is deliberately no uniqueness constraint,
/// so a redelivered event that resends produces a new entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub student_id: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub email: String,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
    pub course_id: String,
    pub score: i64,
    pub passed: bool,
}

/// Represents a document in the 'email_templates' collection.
///
/// Subject and content may contain `{{name}}`, `{{course}}`, `{{score}}`
/// and `{{date}}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    #[serde(rename = "type")]
    pub template_type: String,
    pub subject: String,
    pub content: String,
}

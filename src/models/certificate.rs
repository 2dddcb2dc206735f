// src/models/certificate.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a document in the 'certificates' collection.
///
/// Stored under `certificate_id` so a redelivered event can detect the
/// existing record and short-circuit instead of issuing a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub student_id: String,
    pub course_id: String,
    pub certificate_id: String,
    /// Object-store key the rendered document was uploaded under.
    pub storage_key: String,
    /// Retrieval location returned by the object store.
    pub location: String,
    pub issued_at: DateTime<Utc>,
    pub score: i64,
}

impl Certificate {
    /// Deterministic id: stable across redeliveries of the same attempt,
    /// distinct across attempts.
    pub fn derive_id(student_id: &str, course_id: &str, attempt_number: u32) -> String {
        format!("CERT-{}-{}-{}", student_id, course_id, attempt_number)
    }

    /// True when an existing record describes the same issuance as the
    /// event being processed. A mismatch under the same id is an
    /// invariant violation, never an overwrite.
    pub fn matches(&self, student_id: &str, course_id: &str, score: i64) -> bool {
        self.student_id == student_id && self.course_id == course_id && self.score == score
    }
}

/// Input for the certificate renderer.
#[derive(Debug, Clone)]
pub struct CertificateData {
    pub student_name: String,
    pub course_name: String,
    pub completion_date: String,
    pub score: i64,
    pub certificate_id: String,
}

// src/models/progress.rs

use serde::{Deserialize, Serialize};

/// Represents a document in the 'progress' collection.
///
/// One record per (student, course) pair, stored under the composite key
/// from [`ProgressRecord::key`]. Only the progress aggregator may mutate
/// it; counters are monotonic non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub student_id: String,
    pub course_id: String,
    pub completed_lessons: u32,
    pub total_lessons: u32,
    pub exam_attempts: u32,
    pub passed_exams: u32,
    /// Latest score, not best.
    pub current_score: i64,
}

impl ProgressRecord {
    /// Composite record-store key for a (student, course) pair.
    pub fn key(student_id: &str, course_id: &str) -> String {
        format!("{}_{}", student_id, course_id)
    }

    /// Invariant: a student cannot have passed more exams than attempted.
    pub fn is_consistent(&self) -> bool {
        self.passed_exams <= self.exam_attempts
    }
}

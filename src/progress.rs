// src/progress.rs

use std::fmt;

use crate::models::exam::GradeOutcome;
use crate::models::progress::ProgressRecord;

/// Raised when a stored progress record already contradicts the
/// passed-exams-never-exceed-attempts invariant. Treated as fatal by the
/// caller; this module never repairs records silently.
#[derive(Debug)]
pub struct ProgressError {
    pub student_id: String,
    pub course_id: String,
    pub detail: String,
}

impl fmt::Display for ProgressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "progress record for student '{}' in course '{}' is inconsistent: {}",
            self.student_id, self.course_id, self.detail
        )
    }
}

impl std::error::Error for ProgressError {}

/// Merges one grading outcome into a student's per-course progress.
///
/// Initializes the record lazily when the pair has no history yet. Every
/// call counts one attempt; the caller must invoke it exactly once per
/// accepted submission — there is deliberately no deduplication here, so
/// routing at-least-once deliveries through this function without a guard
/// double-counts.
pub fn merge_attempt(
    existing: Option<ProgressRecord>,
    outcome: &GradeOutcome,
    default_total_lessons: u32,
) -> Result<ProgressRecord, ProgressError> {
    let mut record = match existing {
        Some(record) => {
            if !record.is_consistent() {
                return Err(ProgressError {
                    student_id: outcome.student_id.clone(),
                    course_id: outcome.course_id.clone(),
                    detail: format!(
                        "passedExams {} exceeds examAttempts {}",
                        record.passed_exams, record.exam_attempts
                    ),
                });
            }
            record
        }
        None => ProgressRecord {
            student_id: outcome.student_id.clone(),
            course_id: outcome.course_id.clone(),
            completed_lessons: 0,
            total_lessons: default_total_lessons,
            exam_attempts: 0,
            passed_exams: 0,
            current_score: 0,
        },
    };

    record.exam_attempts += 1;
    if outcome.passed {
        record.passed_exams += 1;
    }
    // Latest score wins, even when lower than a previous attempt.
    record.current_score = outcome.score;

    Ok(record)
}

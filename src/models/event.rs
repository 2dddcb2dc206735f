// src/models/event.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::exam::GradeOutcome;
use crate::models::user::Student;

/// The message published when a submission has been graded.
///
/// This is the sole channel between the orchestrator and the consumers.
/// It is a value snapshot: by the time a consumer acts on it, the records
/// it was derived from may have moved on. Consumers act on the payload and
/// only go back to the record store for data the event does not carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseCompletedEvent {
    pub student_id: String,

    #[serde(default)]
    pub student_name: Option<String>,

    #[serde(default)]
    pub student_email: Option<String>,

    pub course_id: String,

    #[serde(default)]
    pub course_name: Option<String>,

    pub score: i64,
    pub passed: bool,
    pub submitted_at: DateTime<Utc>,
    pub attempt_number: u32,
}

impl CourseCompletedEvent {
    pub fn from_outcome(
        outcome: &GradeOutcome,
        student: &Student,
        course_name: Option<String>,
    ) -> Self {
        Self {
            student_id: outcome.student_id.clone(),
            student_name: student.name.clone(),
            student_email: student.email.clone(),
            course_id: outcome.course_id.clone(),
            course_name,
            score: outcome.score,
            passed: outcome.passed,
            submitted_at: outcome.submitted_at,
            attempt_number: outcome.attempt_number,
        }
    }
}

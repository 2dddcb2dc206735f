// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A single question inside a quiz document.
///
/// The correct answer lives only in the stored definition; it is never
/// echoed back to the submitting client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub text: String,

    /// Options shown to the student (e.g., ["Option A", "Option B"]).
    #[serde(default)]
    pub options: Vec<String>,

    pub correct_answer: String,
}

/// Represents a document in the 'quizzes' collection.
/// The grading engine assumes the definition exists and is well-formed;
/// existence checks belong to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDefinition {
    pub course_id: String,

    #[serde(default)]
    pub course_name: Option<String>,

    /// Passing threshold in percent, 0-100 inclusive.
    pub passing_score: i64,

    pub questions: Vec<Question>,
}

/// DTO for the submission entry point.
///
/// `answers` is index-aligned with the quiz's questions; it may be shorter
/// or longer than the question list, and any answer without a matching
/// question index simply counts as incorrect.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitExamRequest {
    #[validate(length(min = 1, message = "studentId is required"))]
    pub student_id: String,

    #[validate(length(min = 1, message = "courseId is required"))]
    pub course_id: String,

    #[validate(length(min = 1, message = "quizId is required"))]
    pub quiz_id: String,

    pub answers: Vec<String>,

    #[validate(range(min = 1, message = "attemptNumber must be at least 1"))]
    pub attempt_number: Option<u32>,
}

/// A validated submission with its defaults filled in.
#[derive(Debug, Clone)]
pub struct Submission {
    pub student_id: String,
    pub course_id: String,
    pub quiz_id: String,
    pub answers: Vec<String>,
    pub attempt_number: u32,
    pub submitted_at: DateTime<Utc>,
}

impl SubmitExamRequest {
    pub fn into_submission(self, submitted_at: DateTime<Utc>) -> Submission {
        Submission {
            student_id: self.student_id,
            course_id: self.course_id,
            quiz_id: self.quiz_id,
            answers: self.answers,
            attempt_number: self.attempt_number.unwrap_or(1),
            submitted_at,
        }
    }
}

/// Result of grading one submission against one definition.
/// Derived value, never persisted directly; `ExamResult` is the stored form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeOutcome {
    pub student_id: String,
    pub course_id: String,
    pub quiz_id: String,
    pub correct_answers: u32,
    pub total_questions: u32,
    /// Rounded percentage, half-up. Always within 0-100.
    pub score: i64,
    pub passed: bool,
    pub attempt_number: u32,
    pub submitted_at: DateTime<Utc>,
}

/// Represents a document in the 'exam_results' collection.
/// Created once per submission; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub student_id: String,
    pub course_id: String,
    pub quiz_id: String,
    pub score: i64,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub passed: bool,
    pub submitted_at: DateTime<Utc>,
    pub attempt_number: u32,
}

impl ExamResult {
    pub fn from_outcome(outcome: &GradeOutcome) -> Self {
        Self {
            student_id: outcome.student_id.clone(),
            course_id: outcome.course_id.clone(),
            quiz_id: outcome.quiz_id.clone(),
            score: outcome.score,
            correct_answers: outcome.correct_answers,
            total_questions: outcome.total_questions,
            passed: outcome.passed,
            submitted_at: outcome.submitted_at,
            attempt_number: outcome.attempt_number,
        }
    }
}

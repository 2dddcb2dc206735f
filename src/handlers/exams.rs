// src/handlers/exams.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::Utc;
use serde_json::Value;
use validator::Validate;

use crate::{
    config,
    error::AppError,
    grading,
    models::{
        event::CourseCompletedEvent,
        exam::{ExamDefinition, ExamResult, SubmitExamRequest},
        progress::ProgressRecord,
        user::Student,
    },
    progress,
    state::AppState,
    store::collections,
    utils::jwt::Claims,
};

/// Submits a student's exam answers.
///
/// Runs the whole synchronous half of the pipeline in order: validate,
/// grade, persist the exam result, merge progress, publish the completion
/// event. Nothing is persisted before validation and lookups succeed, and
/// nothing is unwound afterwards: once the result and progress are down,
/// a failed publish only degrades the response with a warning, because
/// those records are more durable than the notification side effects.
pub async fn submit_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    tracing::debug!(
        authenticated_as = %claims.sub,
        student_id = %payload.student_id,
        quiz_id = %payload.quiz_id,
        "submission received"
    );

    let quiz_doc = state
        .store
        .get_by_id(collections::QUIZZES, &payload.quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz '{}' not found", payload.quiz_id)))?;
    let definition: ExamDefinition = quiz_doc.parse()?;

    let student_doc = state
        .store
        .get_by_id(collections::USERS, &payload.student_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Student '{}' not found", payload.student_id))
        })?;
    let student: Student = student_doc.parse()?;

    let submission = payload.into_submission(Utc::now());
    let outcome = grading::grade(&definition, &submission);
    tracing::debug!(
        score = outcome.score,
        passed = outcome.passed,
        correct = outcome.correct_answers,
        total = outcome.total_questions,
        "submission graded"
    );

    let exam_result = ExamResult::from_outcome(&outcome);
    let exam_doc = state
        .store
        .create(collections::EXAM_RESULTS, serde_json::to_value(&exam_result)?)
        .await?;

    let progress_key = ProgressRecord::key(&outcome.student_id, &outcome.course_id);
    let existing = match state
        .store
        .get_by_id(collections::PROGRESS, &progress_key)
        .await?
    {
        Some(doc) => Some(doc.parse::<ProgressRecord>()?),
        None => None,
    };
    let merged = progress::merge_attempt(existing, &outcome, state.config.default_total_lessons)?;
    state
        .store
        .put(collections::PROGRESS, &progress_key, serde_json::to_value(&merged)?)
        .await?;

    let event =
        CourseCompletedEvent::from_outcome(&outcome, &student, definition.course_name.clone());
    let mut warning = None;
    match state
        .bus
        .publish(config::COURSE_COMPLETED_TOPIC, serde_json::to_value(&event)?)
        .await
    {
        Ok(()) => {
            tracing::debug!(topic = config::COURSE_COMPLETED_TOPIC, "event published");
        }
        Err(e) => {
            // Degraded success: the exam result and progress stay put.
            tracing::warn!(
                topic = config::COURSE_COMPLETED_TOPIC,
                error = %e,
                "publish failed; certificates and notifications are not guaranteed"
            );
            warning = Some(
                "Exam recorded, but downstream notifications may be delayed".to_string(),
            );
        }
    }

    let mut body = serde_json::json!({
        "score": outcome.score,
        "passed": outcome.passed,
        "correctAnswers": outcome.correct_answers,
        "totalQuestions": outcome.total_questions,
        "examResult": exam_doc,
    });
    if let Some(warning) = warning {
        body["warning"] = Value::String(warning);
    }

    Ok(Json(body))
}

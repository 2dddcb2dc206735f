// src/grading.rs

use crate::models::exam::{ExamDefinition, GradeOutcome, Submission};

/// Grades a submission against an exam definition.
///
/// Pure function, no I/O. Answers are compared by index against the
/// question list: a missing answer, or one beyond the question count,
/// counts as incorrect. An empty definition grades to score 0 / not
/// passed instead of dividing by zero. The passing boundary is
/// inclusive: score == passing_score passes.
pub fn grade(definition: &ExamDefinition, submission: &Submission) -> GradeOutcome {
    let total_questions = definition.questions.len() as u32;

    let mut correct_answers = 0u32;
    for (index, question) in definition.questions.iter().enumerate() {
        let answered_correctly = submission
            .answers
            .get(index)
            .is_some_and(|answer| answer == &question.correct_answer);
        if answered_correctly {
            correct_answers += 1;
        }
    }

    // Round half-up to an integer percentage.
    let score = if total_questions == 0 {
        0
    } else {
        (f64::from(correct_answers) / f64::from(total_questions) * 100.0).round() as i64
    };

    let passed = total_questions > 0 && score >= definition.passing_score;

    GradeOutcome {
        student_id: submission.student_id.clone(),
        course_id: submission.course_id.clone(),
        quiz_id: submission.quiz_id.clone(),
        correct_answers,
        total_questions,
        score,
        passed,
        attempt_number: submission.attempt_number,
        submitted_at: submission.submitted_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exam::Question;
    use chrono::Utc;

    fn definition(passing_score: i64, correct: &[&str]) -> ExamDefinition {
        ExamDefinition {
            course_id: "course-1".to_string(),
            course_name: Some("Intro".to_string()),
            passing_score,
            questions: correct
                .iter()
                .map(|answer| Question {
                    text: "q".to_string(),
                    options: vec![],
                    correct_answer: answer.to_string(),
                })
                .collect(),
        }
    }

    fn submission(answers: &[&str]) -> Submission {
        Submission {
            student_id: "s1".to_string(),
            course_id: "course-1".to_string(),
            quiz_id: "quiz-1".to_string(),
            answers: answers.iter().map(|a| a.to_string()).collect(),
            attempt_number: 1,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn three_of_four_passes_at_seventy() {
        let def = definition(70, &["A", "B", "C", "D"]);
        let outcome = grade(&def, &submission(&["A", "B", "C", "X"]));
        assert_eq!(outcome.correct_answers, 3);
        assert_eq!(outcome.total_questions, 4);
        assert_eq!(outcome.score, 75);
        assert!(outcome.passed);
    }

    #[test]
    fn zero_questions_grades_to_zero_without_panicking() {
        let def = definition(0, &[]);
        let outcome = grade(&def, &submission(&["A"]));
        assert_eq!(outcome.score, 0);
        assert!(!outcome.passed, "empty exams never pass, even at threshold 0");
    }

    #[test]
    fn passing_boundary_is_inclusive() {
        let def = definition(50, &["A", "B"]);
        let outcome = grade(&def, &submission(&["A", "X"]));
        assert_eq!(outcome.score, 50);
        assert!(outcome.passed);
    }

    #[test]
    fn rounds_half_up() {
        // 1/8 = 12.5% -> 13
        let def = definition(70, &["A", "B", "C", "D", "E", "F", "G", "H"]);
        let outcome = grade(&def, &submission(&["A"]));
        assert_eq!(outcome.score, 13);

        // 1/3 = 33.33% -> 33, 2/3 = 66.67% -> 67
        let def = definition(70, &["A", "B", "C"]);
        assert_eq!(grade(&def, &submission(&["A"])).score, 33);
        assert_eq!(grade(&def, &submission(&["A", "B"])).score, 67);
    }

    #[test]
    fn short_and_surplus_answer_lists_never_panic() {
        let def = definition(70, &["A", "B", "C", "D"]);

        let short = grade(&def, &submission(&["A"]));
        assert_eq!(short.correct_answers, 1);

        let surplus = grade(&def, &submission(&["A", "B", "C", "D", "E", "F"]));
        assert_eq!(surplus.correct_answers, 4);
        assert_eq!(surplus.score, 100);
    }

    #[test]
    fn score_stays_within_bounds() {
        let def = definition(70, &["A", "B", "C"]);
        for answers in [&["X", "Y", "Z"][..], &["A", "B", "C"][..], &[][..]] {
            let outcome = grade(&def, &submission(answers));
            assert!((0..=100).contains(&outcome.score));
            assert_eq!(outcome.passed, outcome.score >= def.passing_score);
        }
    }
}

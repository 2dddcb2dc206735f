// src/consumers/notifications.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tokio::time::timeout;

use crate::config;
use crate::consumers::store_failure;
use crate::email::{EmailMessage, EmailSender};
use crate::events::{ConsumerError, EventConsumer};
use crate::models::event::CourseCompletedEvent;
use crate::models::notification::{EmailTemplate, Notification, TYPE_ATTEMPT, TYPE_COMPLETION};
use crate::models::user::Student;
use crate::store::{RecordStore, collections};
use crate::utils::html::{clean_html, html_to_text};

/// Emails the student after every graded attempt, passed or not.
///
/// Template choice follows the outcome; the notification log is
/// append-only, so a redelivered event that reaches the send again simply
/// produces another entry. The only retry path is event redelivery.
pub struct Notifier {
    store: Arc<dyn RecordStore>,
    mailer: Arc<dyn EmailSender>,
}

impl Notifier {
    pub fn new(store: Arc<dyn RecordStore>, mailer: Arc<dyn EmailSender>) -> Self {
        Self { store, mailer }
    }
}

/// Literal placeholder replacement over a closed set of variables.
/// Unknown placeholders stay in the text verbatim.
fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut rendered = template.to_string();
    for (placeholder, value) in vars {
        rendered = rendered.replace(placeholder, value);
    }
    rendered
}

#[async_trait]
impl EventConsumer for Notifier {
    fn name(&self) -> &'static str {
        "notifier"
    }

    async fn handle(&self, payload: Value) -> Result<(), ConsumerError> {
        let event: CourseCompletedEvent = serde_json::from_value(payload)
            .map_err(|e| ConsumerError::Fatal(format!("malformed event payload: {}", e)))?;

        let mut name = event.student_name.clone();
        let mut email = event.student_email.clone();
        if name.is_none() || email.is_none() {
            if let Some(doc) = self
                .store
                .get_by_id(collections::USERS, &event.student_id)
                .await
                .map_err(store_failure)?
            {
                let student: Student =
                    doc.parse().map_err(|e| ConsumerError::Fatal(e.to_string()))?;
                name = name.or(student.name);
                email = email.or(student.email);
            }
        }

        // Without an address this message can never be delivered; do not
        // ask for redelivery.
        let Some(recipient) = email else {
            return Err(ConsumerError::Fatal(format!(
                "no email address on file for student '{}'",
                event.student_id
            )));
        };
        let student_name = name.unwrap_or_else(|| "Student".to_string());

        let notification_type = if event.passed {
            TYPE_COMPLETION
        } else {
            TYPE_ATTEMPT
        };

        let templates = self
            .store
            .find(
                collections::EMAIL_TEMPLATES,
                &json!({ "type": notification_type }),
            )
            .await
            .map_err(store_failure)?;
        // First match wins; the store preserves insertion order, which
        // keeps the choice deterministic when several templates share a
        // type.
        let Some(template_doc) = templates.first() else {
            return Err(ConsumerError::Retryable(format!(
                "no '{}' email template configured",
                notification_type
            )));
        };
        let template: EmailTemplate = template_doc
            .parse()
            .map_err(|e| ConsumerError::Fatal(e.to_string()))?;

        let course_name = event
            .course_name
            .clone()
            .unwrap_or_else(|| "your course".to_string());
        let score = event.score.to_string();
        let date = Utc::now().format("%B %d, %Y").to_string();
        let vars = [
            ("{{name}}", student_name.as_str()),
            ("{{course}}", course_name.as_str()),
            ("{{score}}", score.as_str()),
            ("{{date}}", date.as_str()),
        ];

        let subject = substitute(&template.subject, &vars);
        let body = substitute(&template.content, &vars);

        let message = EmailMessage {
            to: recipient.clone(),
            subject: subject.clone(),
            html: clean_html(&body),
            text: html_to_text(&body),
        };

        timeout(config::EXTERNAL_CALL_TIMEOUT, self.mailer.send(&message))
            .await
            .map_err(|_| ConsumerError::Retryable("email send timed out".to_string()))?
            .map_err(|e| ConsumerError::Retryable(e.to_string()))?;

        let notification = Notification {
            student_id: event.student_id.clone(),
            notification_type: notification_type.to_string(),
            email: recipient,
            subject,
            sent_at: Utc::now(),
            course_id: event.course_id.clone(),
            score: event.score,
            passed: event.passed,
        };
        let record = serde_json::to_value(&notification)
            .map_err(|e| ConsumerError::Fatal(e.to_string()))?;
        self.store
            .create(collections::NOTIFICATIONS, record)
            .await
            .map_err(store_failure)?;

        tracing::info!(
            student_id = %event.student_id,
            course_id = %event.course_id,
            notification_type,
            "notification sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_the_closed_variable_set() {
        let rendered = substitute(
            "Hi {{name}}, you scored {{score}}% in {{course}} on {{date}}.",
            &[
                ("{{name}}", "Ada"),
                ("{{course}}", "Intro"),
                ("{{score}}", "95"),
                ("{{date}}", "August 7, 2026"),
            ],
        );
        assert_eq!(rendered, "Hi Ada, you scored 95% in Intro on August 7, 2026.");
    }

    #[test]
    fn unknown_placeholders_stay_verbatim() {
        let rendered = substitute("Hi {{name}}, ref {{ticket}}", &[("{{name}}", "Ada")]);
        assert_eq!(rendered, "Hi Ada, ref {{ticket}}");
    }

    #[test]
    fn repeated_placeholders_are_all_replaced() {
        let rendered = substitute("{{name}} and {{name}}", &[("{{name}}", "Ada")]);
        assert_eq!(rendered, "Ada and Ada");
    }
}

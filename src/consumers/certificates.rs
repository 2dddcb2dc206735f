// src/consumers/certificates.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::time::timeout;

use crate::config;
use crate::consumers::store_failure;
use crate::events::{ConsumerError, EventConsumer};
use crate::models::certificate::{Certificate, CertificateData};
use crate::models::event::CourseCompletedEvent;
use crate::models::user::Student;
use crate::objects::BlobStore;
use crate::pdf::CertificateRenderer;
use crate::store::{RecordStore, collections};

/// Issues a certificate for every passing completion event.
///
/// Redelivery-safe: the certificate id derives from the event's attempt,
/// so a second delivery finds the existing record and stops before any
/// storage write. Failing attempts are an explicit no-op. This consumer
/// never touches progress records.
pub struct CertificateIssuer {
    store: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    renderer: Arc<dyn CertificateRenderer>,
}

impl CertificateIssuer {
    pub fn new(
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        renderer: Arc<dyn CertificateRenderer>,
    ) -> Self {
        Self {
            store,
            blobs,
            renderer,
        }
    }

    /// The event is authoritative when it carries a name; the store is
    /// only consulted for what the snapshot lacks.
    async fn resolve_student_name(
        &self,
        event: &CourseCompletedEvent,
    ) -> Result<String, ConsumerError> {
        if let Some(name) = &event.student_name {
            return Ok(name.clone());
        }
        let doc = self
            .store
            .get_by_id(collections::USERS, &event.student_id)
            .await
            .map_err(store_failure)?;
        Ok(doc
            .and_then(|d| d.parse::<Student>().ok())
            .and_then(|s| s.name)
            .unwrap_or_else(|| "Student".to_string()))
    }

    async fn resolve_course_name(
        &self,
        event: &CourseCompletedEvent,
    ) -> Result<String, ConsumerError> {
        if let Some(name) = &event.course_name {
            return Ok(name.clone());
        }
        let doc = self
            .store
            .get_by_id(collections::COURSES, &event.course_id)
            .await
            .map_err(store_failure)?;
        Ok(doc
            .and_then(|d| d.data.get("name").and_then(Value::as_str).map(String::from))
            .unwrap_or_else(|| "Course".to_string()))
    }
}

#[async_trait]
impl EventConsumer for CertificateIssuer {
    fn name(&self) -> &'static str {
        "certificate-issuer"
    }

    async fn handle(&self, payload: Value) -> Result<(), ConsumerError> {
        let event: CourseCompletedEvent = serde_json::from_value(payload)
            .map_err(|e| ConsumerError::Fatal(format!("malformed event payload: {}", e)))?;

        if !event.passed {
            tracing::debug!(
                student_id = %event.student_id,
                course_id = %event.course_id,
                "attempt did not pass, no certificate"
            );
            return Ok(());
        }

        let certificate_id =
            Certificate::derive_id(&event.student_id, &event.course_id, event.attempt_number);

        if let Some(existing) = self
            .store
            .get_by_id(collections::CERTIFICATES, &certificate_id)
            .await
            .map_err(store_failure)?
        {
            let existing: Certificate = existing
                .parse()
                .map_err(|e| ConsumerError::Fatal(e.to_string()))?;
            if existing.matches(&event.student_id, &event.course_id, event.score) {
                tracing::info!(
                    certificate_id = %certificate_id,
                    "certificate already issued, skipping redelivered event"
                );
                return Ok(());
            }
            return Err(ConsumerError::Fatal(format!(
                "certificate '{}' already exists with a different payload; refusing to overwrite",
                certificate_id
            )));
        }

        let student_name = self.resolve_student_name(&event).await?;
        let course_name = self.resolve_course_name(&event).await?;

        let data = CertificateData {
            student_name,
            course_name,
            completion_date: event.submitted_at.format("%B %d, %Y").to_string(),
            score: event.score,
            certificate_id: certificate_id.clone(),
        };
        let document = self
            .renderer
            .render(&data)
            .map_err(|e| ConsumerError::Fatal(e.to_string()))?;

        let storage_key = format!(
            "certificates/{}/{}.pdf",
            event.student_id, certificate_id
        );
        let location = timeout(
            config::EXTERNAL_CALL_TIMEOUT,
            self.blobs
                .put(&storage_key, document, self.renderer.content_type()),
        )
        .await
        .map_err(|_| ConsumerError::Retryable("certificate upload timed out".to_string()))?
        .map_err(|e| ConsumerError::Retryable(e.to_string()))?;

        // The durable record goes in only after the upload succeeded, so a
        // crash in between leaves nothing pointing at a missing blob.
        let certificate = Certificate {
            student_id: event.student_id.clone(),
            course_id: event.course_id.clone(),
            certificate_id: certificate_id.clone(),
            storage_key,
            location,
            issued_at: Utc::now(),
            score: event.score,
        };
        let record = serde_json::to_value(&certificate)
            .map_err(|e| ConsumerError::Fatal(e.to_string()))?;
        self.store
            .put(collections::CERTIFICATES, &certificate_id, record)
            .await
            .map_err(store_failure)?;

        tracing::info!(
            certificate_id = %certificate_id,
            student_id = %event.student_id,
            course_id = %event.course_id,
            score = event.score,
            "certificate issued"
        );
        Ok(())
    }
}

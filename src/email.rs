// src/email.rs

use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use url::Url;

use crate::config;

/// A fully rendered transactional email.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug)]
pub enum EmailError {
    Transport(String),
    InvalidConfig(String),
}

impl fmt::Display for EmailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailError::Transport(msg) => write!(f, "email transport error: {}", msg),
            EmailError::InvalidConfig(msg) => write!(f, "email sender misconfigured: {}", msg),
        }
    }
}

impl std::error::Error for EmailError {}

impl From<reqwest::Error> for EmailError {
    fn from(err: reqwest::Error) -> Self {
        EmailError::Transport(err.to_string())
    }
}

/// Outbound email delivery. Errors on transport failure; the caller
/// decides whether the surrounding event gets redelivered.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Posts rendered messages to an HTTP relay endpoint as JSON.
pub struct HttpEmailSender {
    client: reqwest::Client,
    endpoint: Url,
    from: String,
}

impl HttpEmailSender {
    pub fn new(endpoint: Url, from: String) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder()
            .timeout(config::EXTERNAL_CALL_TIMEOUT)
            .build()
            .map_err(|e| EmailError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            from,
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let body = json!({
            "from": self.from,
            "to": message.to,
            "subject": message.subject,
            "html": message.html,
            "text": message.text,
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;

        response.error_for_status()?;
        tracing::debug!(to = %message.to, subject = %message.subject, "email relayed");
        Ok(())
    }
}

/// Keeps sent messages in memory instead of delivering them.
/// Used by tests and local dry runs.
pub struct RecordingEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for RecordingEmailSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.sent
            .lock()
            .map_err(|_| EmailError::Transport("recording sender lock poisoned".to_string()))?
            .push(message.clone());
        Ok(())
    }
}

// src/config.rs

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;
use url::Url;

/// Topic the submission orchestrator publishes graded outcomes to.
/// Both consumers subscribe to it independently.
pub const COURSE_COMPLETED_TOPIC: &str = "course-completed";

/// Upper bound for any single call to an external collaborator
/// (object-store upload, email send, event delivery attempt).
/// A timed-out call counts as a failure for redelivery purposes.
pub const EXTERNAL_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// How many times the bus delivers one event to one consumer before
/// giving up. Redelivery is the only retry path consumers get.
pub const REDELIVERY_ATTEMPTS: u32 = 3;

/// Base delay between redeliveries, multiplied by the attempt number.
pub const REDELIVERY_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,

    /// Lesson count used when a progress record is created lazily on the
    /// first submission for a (student, course) pair.
    pub default_total_lessons: u32,

    /// HTTP relay endpoint the email sender posts rendered messages to.
    pub email_api_url: Url,
    pub email_from: String,

    /// Root directory for the local object-store backend.
    pub object_store_root: PathBuf,
    /// Base URL prefixed to object keys to form retrieval locations.
    pub public_base_url: Url,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let default_total_lessons = env::var("DEFAULT_TOTAL_LESSONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let email_api_url = env::var("EMAIL_API_URL")
            .unwrap_or_else(|_| "http://localhost:8025/api/send".to_string())
            .parse()
            .expect("EMAIL_API_URL must be a valid URL");

        let email_from =
            env::var("EMAIL_FROM").unwrap_or_else(|_| "noreply@example.com".to_string());

        let object_store_root = env::var("OBJECT_STORE_ROOT")
            .unwrap_or_else(|_| "data/objects".to_string())
            .into();

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000/files".to_string())
            .parse()
            .expect("PUBLIC_BASE_URL must be a valid URL");

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            default_total_lessons,
            email_api_url,
            email_from,
            object_store_root,
            public_base_url,
        }
    }
}

// src/consumers/mod.rs

pub mod certificates;
pub mod notifications;

pub use certificates::CertificateIssuer;
pub use notifications::Notifier;

use crate::events::ConsumerError;
use crate::store::StoreError;

/// Record-store failures inside a consumer are transient I/O: the event
/// gets redelivered rather than the consumer retrying in place.
pub(crate) fn store_failure(err: StoreError) -> ConsumerError {
    match err {
        StoreError::Backend(_) => ConsumerError::Retryable(err.to_string()),
        // A payload that cannot be a document, or a record that no longer
        // parses, will not get better on redelivery.
        StoreError::InvalidDocument(_) | StoreError::Corrupt { .. } => {
            ConsumerError::Fatal(err.to_string())
        }
    }
}

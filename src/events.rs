// src/events.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config;

/// How a consumer reports failure for one message.
///
/// `Retryable` asks for the event to be delivered again (bounded, with
/// backoff) — the only retry path a consumer gets. `Fatal` means this
/// message can never succeed; it is logged and dropped.
#[derive(Debug)]
pub enum ConsumerError {
    Fatal(String),
    Retryable(String),
}

impl fmt::Display for ConsumerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerError::Fatal(msg) => write!(f, "fatal: {}", msg),
            ConsumerError::Retryable(msg) => write!(f, "retryable: {}", msg),
        }
    }
}

impl std::error::Error for ConsumerError {}

/// A handler subscribed to a topic. Handlers run independently and
/// concurrently, may observe an event more than once, and therefore must
/// be idempotent or de-duplicate on their own.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, payload: Value) -> Result<(), ConsumerError>;
}

#[derive(Debug)]
pub enum BusError {
    /// No subscriber accepted the message (all queues gone).
    NoDelivery(String),
    Internal(String),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::NoDelivery(topic) => {
                write!(f, "event on '{}' reached no subscriber", topic)
            }
            BusError::Internal(msg) => write!(f, "event bus error: {}", msg),
        }
    }
}

impl std::error::Error for BusError {}

/// Topic-based publish/subscribe with at-least-once delivery.
///
/// Publishing never waits for consumers to finish; a publish failure is
/// reported to the caller, who treats it as degraded success rather than
/// rolling anything back.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), BusError>;

    fn subscribe(&self, topic: &str, consumer: Arc<dyn EventConsumer>);
}

/// Per-delivery knobs for the in-process bus.
#[derive(Debug, Clone)]
pub struct DeliveryOptions {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            max_attempts: config::REDELIVERY_ATTEMPTS,
            backoff: config::REDELIVERY_BACKOFF,
            attempt_timeout: config::EXTERNAL_CALL_TIMEOUT,
        }
    }
}

/// In-process event bus.
///
/// Each subscription gets its own bounded queue drained by its own worker
/// task, so consumers never see each other's failures or latency. A
/// retryable failure (or a timed-out attempt) redelivers the same payload
/// to that consumer up to `max_attempts` times.
pub struct InProcessEventBus {
    topics: Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>,
    options: DeliveryOptions,
}

impl InProcessEventBus {
    pub fn new(options: DeliveryOptions) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            options,
        }
    }
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new(DeliveryOptions::default())
    }
}

#[async_trait]
impl EventBus for InProcessEventBus {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), BusError> {
        let senders: Vec<mpsc::Sender<Value>> = {
            let topics = self
                .topics
                .lock()
                .map_err(|_| BusError::Internal("subscription registry poisoned".to_string()))?;
            topics.get(topic).cloned().unwrap_or_default()
        };

        if senders.is_empty() {
            // Zero consumers is a legal topology; the event just vanishes.
            tracing::debug!(topic, "published event with no subscribers");
            return Ok(());
        }

        let mut delivered = 0usize;
        for sender in &senders {
            if sender.send(payload.clone()).await.is_ok() {
                delivered += 1;
            }
        }

        if delivered == 0 {
            return Err(BusError::NoDelivery(topic.to_string()));
        }
        if delivered < senders.len() {
            tracing::warn!(
                topic,
                delivered,
                subscribers = senders.len(),
                "event reached only part of the subscribers"
            );
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str, consumer: Arc<dyn EventConsumer>) {
        let (tx, mut rx) = mpsc::channel::<Value>(64);

        {
            let mut topics = match self.topics.lock() {
                Ok(guard) => guard,
                Err(_) => {
                    tracing::error!(topic, "subscription registry poisoned; subscribe dropped");
                    return;
                }
            };
            topics.entry(topic.to_string()).or_default().push(tx);
        }

        let options = self.options.clone();
        let topic = topic.to_string();
        tokio::spawn(async move {
            tracing::info!(topic = %topic, consumer = consumer.name(), "consumer subscribed");
            while let Some(payload) = rx.recv().await {
                deliver(&topic, consumer.as_ref(), payload, &options).await;
            }
            tracing::info!(topic = %topic, consumer = consumer.name(), "consumer stopped");
        });
    }
}

/// Drives one payload through one consumer, redelivering on retryable
/// failures until the attempt budget runs out.
async fn deliver(topic: &str, consumer: &dyn EventConsumer, payload: Value, options: &DeliveryOptions) {
    let mut attempt = 1u32;
    loop {
        let outcome =
            tokio::time::timeout(options.attempt_timeout, consumer.handle(payload.clone())).await;

        match outcome {
            Ok(Ok(())) => {
                tracing::debug!(topic, consumer = consumer.name(), attempt, "event handled");
                return;
            }
            Ok(Err(ConsumerError::Fatal(msg))) => {
                tracing::error!(
                    topic,
                    consumer = consumer.name(),
                    attempt,
                    "dropping event after fatal consumer error: {}",
                    msg
                );
                return;
            }
            Ok(Err(ConsumerError::Retryable(msg))) => {
                tracing::warn!(
                    topic,
                    consumer = consumer.name(),
                    attempt,
                    "consumer failed, will redeliver: {}",
                    msg
                );
            }
            Err(_) => {
                tracing::warn!(
                    topic,
                    consumer = consumer.name(),
                    attempt,
                    "delivery attempt timed out, will redeliver"
                );
            }
        }

        if attempt >= options.max_attempts {
            tracing::error!(
                topic,
                consumer = consumer.name(),
                attempts = attempt,
                "giving up on event after exhausting redeliveries"
            );
            return;
        }
        tokio::time::sleep(options.backoff * attempt).await;
        attempt += 1;
    }
}

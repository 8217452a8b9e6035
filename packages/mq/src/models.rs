use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
pub use broccoli_queue::{
    brokers::broker::BrokerMessage, error::BroccoliError, queue::BroccoliQueue,
};
use common::mq::{BusPublisher, MqError};
use serde_json::value::RawValue;
use tracing::debug;

pub type MqQueue = BroccoliQueue;

pub struct MqConfig {
    pub url: String,
    pub pool_size: u8,
}

pub async fn init_mq(config: MqConfig) -> Result<MqQueue, MqError> {
    BroccoliQueue::builder(&config.url)
        .pool_connections(config.pool_size)
        .build()
        .await
        .map_err(|e| MqError::Connection(e.to_string()))
}

/// Bus adapter that maps subjects onto broccoli topics.
///
/// Payloads travel as raw JSON inside the broker envelope, so subscribers see
/// exactly the bytes that were published.
#[derive(Clone)]
pub struct BroccoliBus {
    queue: Arc<MqQueue>,
}

impl BroccoliBus {
    pub fn new(queue: Arc<MqQueue>) -> Self {
        Self { queue }
    }

    /// Consume `subject` until the subscription fails, handing every payload
    /// to `handler`. Messages are always acknowledged.
    pub async fn consume<F, Fut>(&self, subject: &str, handler: F) -> Result<(), MqError>
    where
        F: Fn(Box<RawValue>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.queue
            .process_messages(
                subject,
                None,
                None,
                move |message: BrokerMessage<Box<RawValue>>| {
                    let handler = handler.clone();
                    async move {
                        handler(message.payload).await;
                        Ok(())
                    }
                },
            )
            .await
            .map_err(|e| MqError::Internal(e.to_string()))
    }
}

impl std::fmt::Debug for BroccoliBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroccoliBus").finish_non_exhaustive()
    }
}

#[async_trait]
impl BusPublisher for BroccoliBus {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), MqError> {
        let message: Box<RawValue> =
            serde_json::from_slice(payload).map_err(|e| MqError::InvalidPayload {
                subject: subject.to_string(),
                source: e,
            })?;

        self.queue
            .publish(subject, None, &message, None)
            .await
            .map_err(|e| MqError::PublishFailed {
                subject: subject.to_string(),
                reason: e.to_string(),
            })?;

        debug!(subject, bytes = payload.len(), "Published message");
        Ok(())
    }
}

/// Stand-in used when the bus is switched off in configuration. Every publish
/// fails, so API retries surface as errors instead of silently vanishing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledBus;

#[async_trait]
impl BusPublisher for DisabledBus {
    async fn publish(&self, subject: &str, _payload: &[u8]) -> Result<(), MqError> {
        Err(MqError::PublishFailed {
            subject: subject.to_string(),
            reason: "message bus is disabled".to_string(),
        })
    }
}

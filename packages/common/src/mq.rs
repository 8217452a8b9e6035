use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

/// Fire-and-forget publishing onto the message bus.
///
/// The payload is handed over as raw bytes and must reach subscribers
/// unchanged. Delivery guarantees are whatever the backing transport offers.
#[async_trait]
pub trait BusPublisher: Send + Sync + Debug {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), MqError>;
}

#[derive(Debug, Error)]
pub enum MqError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid payload for {subject}: {source}")]
    InvalidPayload {
        subject: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Publish to {subject} failed: {reason}")]
    PublishFailed { subject: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

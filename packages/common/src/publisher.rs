use std::sync::Arc;

use chrono::Utc;
use serde_json::value::RawValue;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::dlq::{DlqEntry, Reason, Source, subject_for_reason};
use crate::mq::{BusPublisher, MqError};
use crate::retry::RetryAttempt;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to serialize dead-letter entry: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to publish dead-letter entry: {0}")]
    Bus(#[from] MqError),
}

/// Everything a producer knows about a unit of work it is giving up on.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub original_subject: String,
    pub original_payload: Box<RawValue>,
    pub reason: Reason,
    pub reason_detail: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub retry_history: Option<Vec<RetryAttempt>>,
    pub recoverable: bool,
}

/// Emits dead-letter events on behalf of one originating subsystem.
#[derive(Debug, Clone)]
pub struct DlqPublisher {
    bus: Arc<dyn BusPublisher>,
    source: Source,
}

impl DlqPublisher {
    pub fn new(bus: Arc<dyn BusPublisher>, source: Source) -> Self {
        Self { bus, source }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Build a fresh entry and publish it to the subject for its reason.
    ///
    /// Makes exactly one publish attempt. An error means the dead letter was
    /// not recorded; falling back (e.g. to local logging) is up to the caller.
    pub async fn publish(&self, opts: PublishOptions) -> Result<DlqEntry, PublishError> {
        let entry = DlqEntry {
            dlq_id: Uuid::new_v4().to_string(),
            original_subject: opts.original_subject,
            original_payload: opts.original_payload,
            reason: opts.reason,
            reason_detail: opts.reason_detail,
            failed_at: Utc::now(),
            retry_count: opts.retry_count,
            max_retries: opts.max_retries,
            retry_history: opts.retry_history.unwrap_or_default(),
            source: self.source.clone(),
            recoverable: opts.recoverable,
            recovered: false,
            recovered_at: None,
            recovered_by: None,
        };

        let data = serde_json::to_vec(&entry)?;
        let subject = subject_for_reason(&self.source, &entry.reason);

        self.bus.publish(subject, &data).await?;

        debug!(
            dlq_id = %entry.dlq_id,
            subject,
            reason = %entry.reason,
            "Published dead-letter entry"
        );

        Ok(entry)
    }
}

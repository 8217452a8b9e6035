use std::sync::Arc;

use common::DlqEnvelope;
use tracing::{error, info, warn};

use super::store::DlqStore;

/// Turns raw dead-letter events from the bus into stored entries.
///
/// Every failure is logged and the message dropped; nothing is reported back
/// to the bus.
#[derive(Clone)]
pub struct DlqProcessor {
    store: Arc<dyn DlqStore>,
}

impl DlqProcessor {
    pub fn new(store: Arc<dyn DlqStore>) -> Self {
        Self { store }
    }

    pub async fn process(&self, subject: &str, data: &[u8]) {
        let envelope: DlqEnvelope = match serde_json::from_slice(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(subject, error = %e, "Dropping malformed DLQ message");
                return;
            }
        };

        let entry = envelope.into_entry(subject);

        if let Err(e) = self.store.insert(&entry).await {
            error!(
                subject,
                dlq_id = %entry.dlq_id,
                error = %e,
                "Failed to persist DLQ entry"
            );
            return;
        }

        info!(
            dlq_id = %entry.dlq_id,
            reason = %entry.reason,
            source = %entry.source,
            original_subject = %entry.original_subject,
            "Stored DLQ entry"
        );
    }
}

use common::dlq::subjects;
use mq::BroccoliBus;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::dlq::DlqProcessor;

/// Feed every message on `subject` to the processor until the subscription ends.
pub async fn consume_dlq_subject(bus: BroccoliBus, processor: DlqProcessor, subject: &'static str) {
    info!(subject, "Starting DLQ consumer");

    let result = bus
        .consume(subject, move |payload| {
            let processor = processor.clone();
            async move {
                processor.process(subject, payload.get().as_bytes()).await;
            }
        })
        .await;

    if let Err(e) = result {
        error!(subject, error = %e, "DLQ consumer stopped");
    }
}

/// One consumer task per dead-letter subject.
pub fn spawn_dlq_consumers(bus: &BroccoliBus, processor: &DlqProcessor) -> Vec<JoinHandle<()>> {
    subjects::ALL
        .iter()
        .map(|&subject| {
            tokio::spawn(consume_dlq_subject(bus.clone(), processor.clone(), subject))
        })
        .collect()
}

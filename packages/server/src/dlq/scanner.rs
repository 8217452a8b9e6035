use std::sync::Arc;
use std::time::Duration;

use common::{BusPublisher, DlqEntry, RecoveredBy};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::store::{DlqStore, StoreError};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub total: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Why a single entry could not be recovered.
#[derive(Debug, thiserror::Error)]
pub enum RecoverError {
    #[error("republish failed: {0}")]
    Publish(#[from] common::MqError),

    #[error(transparent)]
    Mark(StoreError),
}

/// Republish an entry's original payload to its original subject, then mark
/// it recovered. Nothing is marked unless the publish succeeded.
pub async fn recover_entry(
    store: &dyn DlqStore,
    bus: &dyn BusPublisher,
    entry: &DlqEntry,
    recovered_by: &str,
) -> Result<(), RecoverError> {
    bus.publish(&entry.original_subject, entry.original_payload.get().as_bytes())
        .await?;
    store
        .mark_recovered(&entry.dlq_id, recovered_by)
        .await
        .map_err(RecoverError::Mark)
}

/// Attempt recovery of every recoverable entry, oldest first.
///
/// Per-entry faults are logged and counted; only a failure to list aborts.
pub async fn reconcile(
    store: &dyn DlqStore,
    bus: &dyn BusPublisher,
    recovered_by: &str,
) -> Result<PassSummary, StoreError> {
    let entries = store.list_recoverable().await?;
    let mut summary = PassSummary {
        total: entries.len(),
        ..Default::default()
    };

    for entry in &entries {
        match recover_entry(store, bus, entry, recovered_by).await {
            Ok(()) => {
                summary.retried += 1;
                info!(
                    dlq_id = %entry.dlq_id,
                    subject = %entry.original_subject,
                    recovered_by,
                    "Recovered DLQ entry"
                );
            }
            Err(RecoverError::Publish(e)) => {
                summary.failed += 1;
                warn!(dlq_id = %entry.dlq_id, error = %e, "Failed to republish DLQ entry");
            }
            Err(RecoverError::Mark(e)) => {
                // Already republished; the entry stays eligible for the next pass.
                summary.failed += 1;
                error!(dlq_id = %entry.dlq_id, error = %e, "Failed to mark DLQ entry recovered");
            }
        }
    }

    Ok(summary)
}

/// Periodic background recovery of recoverable entries.
#[derive(Clone)]
pub struct Scanner {
    store: Arc<dyn DlqStore>,
    bus: Arc<dyn BusPublisher>,
    interval: Duration,
}

impl Scanner {
    pub fn new(store: Arc<dyn DlqStore>, bus: Arc<dyn BusPublisher>, interval: Duration) -> Self {
        Self {
            store,
            bus,
            interval,
        }
    }

    /// Run a single pass immediately.
    pub async fn scan_once(&self) -> Result<PassSummary, StoreError> {
        let summary = reconcile(
            self.store.as_ref(),
            self.bus.as_ref(),
            RecoveredBy::AUTO_SCANNER,
        )
        .await?;

        if summary.total > 0 {
            info!(
                total = summary.total,
                retried = summary.retried,
                failed = summary.failed,
                "DLQ scan complete"
            );
        } else {
            debug!("DLQ scan found nothing to recover");
        }
        Ok(summary)
    }

    /// Spawn the scan loop. The first pass runs one interval after start and
    /// cancellation is only observed between passes.
    pub fn start(self, token: CancellationToken) -> ScannerHandle {
        info!(interval_secs = self.interval.as_secs(), "Starting DLQ recovery scanner");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.scan_once().await {
                            error!(error = %e, "DLQ scan failed");
                        }
                    }
                }
            }

            info!("DLQ recovery scanner stopped");
        });

        ScannerHandle { handle }
    }
}

/// Join handle for a running [`Scanner`].
pub struct ScannerHandle {
    handle: JoinHandle<()>,
}

impl ScannerHandle {
    /// Wait for the loop to exit after its token is cancelled.
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            error!(error = %e, "DLQ scanner task ended abnormally");
        }
    }
}

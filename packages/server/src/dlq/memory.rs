use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{DlqEntry, DlqStats};
use tokio::sync::Mutex;

use super::store::{
    DEFAULT_RECOVERY_WINDOW_SECS, DlqStore, ListFilter, StoreError, recovery_cutoff,
};

/// In-process [`DlqStore`] for tests and database-less runs.
#[derive(Debug)]
pub struct MemoryDlqStore {
    entries: Mutex<HashMap<String, DlqEntry>>,
    recovery_window: Duration,
}

impl Default for MemoryDlqStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDlqStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            recovery_window: Duration::from_secs(DEFAULT_RECOVERY_WINDOW_SECS),
        }
    }

    pub fn with_recovery_window(mut self, window: Duration) -> Self {
        self.recovery_window = window;
        self
    }
}

#[async_trait]
impl DlqStore for MemoryDlqStore {
    async fn insert(&self, entry: &DlqEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.entry(entry.dlq_id.clone()).or_insert_with(|| {
            let mut fresh = entry.clone();
            fresh.recovered = false;
            fresh.recovered_at = None;
            fresh.recovered_by = None;
            fresh
        });
        Ok(())
    }

    async fn get(&self, dlq_id: &str) -> Result<DlqEntry, StoreError> {
        self.entries
            .lock()
            .await
            .get(dlq_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(dlq_id.to_string()))
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<DlqEntry>, StoreError> {
        let entries = self.entries.lock().await;
        let mut matched: Vec<DlqEntry> = entries
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.failed_at.cmp(&a.failed_at));
        matched.truncate(usize::try_from(filter.effective_limit()).unwrap_or(usize::MAX));
        Ok(matched)
    }

    async fn list_recoverable(&self) -> Result<Vec<DlqEntry>, StoreError> {
        let cutoff = recovery_cutoff(self.recovery_window);
        let entries = self.entries.lock().await;
        let mut matched: Vec<DlqEntry> = entries
            .values()
            .filter(|e| e.recoverable && !e.recovered && e.failed_at > cutoff)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.failed_at.cmp(&b.failed_at));
        Ok(matched)
    }

    async fn mark_recovered(&self, dlq_id: &str, recovered_by: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(dlq_id)
            .ok_or_else(|| StoreError::NotFound(dlq_id.to_string()))?;

        if entry.recovered {
            return Err(StoreError::AlreadyRecovered(dlq_id.to_string()));
        }

        entry.recovered = true;
        entry.recovered_at = Some(Utc::now());
        entry.recovered_by = Some(recovered_by.to_string());
        Ok(())
    }

    async fn stats(&self) -> Result<DlqStats, StoreError> {
        let entries = self.entries.lock().await;
        let mut stats = DlqStats {
            total: entries.len() as u64,
            ..Default::default()
        };

        for entry in entries.values().filter(|e| !e.recovered) {
            stats.unrecovered += 1;
            if entry.recoverable {
                stats.recoverable += 1;
            }
            *stats.by_reason.entry(entry.reason.to_string()).or_insert(0) += 1;
            *stats.by_source.entry(entry.source.to_string()).or_insert(0) += 1;
        }

        Ok(stats)
    }
}

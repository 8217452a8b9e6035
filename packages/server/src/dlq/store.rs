use async_trait::async_trait;
use common::{DlqEntry, DlqStats, Reason, Source};
use sea_orm::DbErr;
use thiserror::Error;

/// Page size used when a list request does not ask for a positive limit.
pub const DEFAULT_LIST_LIMIT: u64 = 50;

/// How far back `list_recoverable` looks for failures by default.
pub const DEFAULT_RECOVERY_WINDOW_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dlq entry {0} not found")]
    NotFound(String),

    #[error("dlq entry {0} already recovered")]
    AlreadyRecovered(String),

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("corrupt dlq entry {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Optional filters for [`DlqStore::list`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub recovered: Option<bool>,
    pub reason: Option<Reason>,
    pub source: Option<Source>,
    pub limit: Option<i64>,
}

impl ListFilter {
    /// Effective row cap: the requested limit, or the default when unset or
    /// not positive.
    pub fn effective_limit(&self) -> u64 {
        match self.limit {
            Some(n) if n > 0 => n as u64,
            _ => DEFAULT_LIST_LIMIT,
        }
    }

    pub fn matches(&self, entry: &DlqEntry) -> bool {
        self.recovered.is_none_or(|r| entry.recovered == r)
            && self.reason.as_ref().is_none_or(|r| entry.reason == *r)
            && self.source.as_ref().is_none_or(|s| entry.source == *s)
    }
}

/// Persistence for dead-letter entries.
///
/// `mark_recovered` is the only mutation after insert and must be a single
/// conditional update in the backing store: concurrent callers racing on the
/// same id get exactly one success.
#[async_trait]
pub trait DlqStore: Send + Sync {
    /// Persist a new entry. An existing id is left untouched and is not an error.
    async fn insert(&self, entry: &DlqEntry) -> Result<(), StoreError>;

    async fn get(&self, dlq_id: &str) -> Result<DlqEntry, StoreError>;

    /// Newest failures first, capped at [`ListFilter::effective_limit`].
    async fn list(&self, filter: &ListFilter) -> Result<Vec<DlqEntry>, StoreError>;

    /// Recoverable, unrecovered entries inside the recovery window, oldest first.
    async fn list_recoverable(&self) -> Result<Vec<DlqEntry>, StoreError>;

    /// Flip `recovered` to true, stamping time and actor.
    ///
    /// Fails with [`StoreError::NotFound`] or [`StoreError::AlreadyRecovered`]
    /// when the transition is not possible.
    async fn mark_recovered(&self, dlq_id: &str, recovered_by: &str) -> Result<(), StoreError>;

    async fn stats(&self) -> Result<DlqStats, StoreError>;
}

/// Oldest failure time still eligible for automated recovery.
pub fn recovery_cutoff(window: std::time::Duration) -> chrono::DateTime<chrono::Utc> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|w| chrono::Utc::now().checked_sub_signed(w))
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC)
}

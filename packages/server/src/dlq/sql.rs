use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{DlqEntry, DlqStats, RetryAttempt, Source};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, sea_query::Expr, sea_query::OnConflict,
};
use serde_json::value::RawValue;
use tracing::warn;

use super::store::{
    DEFAULT_RECOVERY_WINDOW_SECS, DlqStore, ListFilter, StoreError, recovery_cutoff,
};
use crate::entity::dlq_entry;

/// Postgres-backed [`DlqStore`].
#[derive(Debug)]
pub struct SqlDlqStore {
    db: DatabaseConnection,
    recovery_window: Duration,
}

impl SqlDlqStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            recovery_window: Duration::from_secs(DEFAULT_RECOVERY_WINDOW_SECS),
        }
    }

    pub fn with_recovery_window(mut self, window: Duration) -> Self {
        self.recovery_window = window;
        self
    }

    /// Unrecovered row counts grouped by the values of `column`.
    async fn count_unrecovered_by(
        &self,
        column: dlq_entry::Column,
    ) -> Result<HashMap<String, u64>, StoreError> {
        let groups: Vec<(String, i64)> = dlq_entry::Entity::find()
            .select_only()
            .column(column)
            .column_as(dlq_entry::Column::DlqId.count(), "count")
            .filter(dlq_entry::Column::Recovered.eq(false))
            .group_by(column)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(groups
            .into_iter()
            .map(|(key, count)| (key, u64::try_from(count).unwrap_or(0)))
            .collect())
    }
}

fn to_active_model(entry: &DlqEntry) -> dlq_entry::ActiveModel {
    dlq_entry::ActiveModel {
        dlq_id: Set(entry.dlq_id.clone()),
        original_subject: Set(entry.original_subject.clone()),
        original_payload: Set(entry.original_payload.get().to_string()),
        reason: Set(entry.reason.to_string()),
        reason_detail: Set(entry.reason_detail.clone()),
        failed_at: Set(entry.failed_at),
        retry_count: Set(i32::try_from(entry.retry_count).unwrap_or(i32::MAX)),
        max_retries: Set(i32::try_from(entry.max_retries).unwrap_or(i32::MAX)),
        retry_history: Set(
            serde_json::to_value(&entry.retry_history).unwrap_or_else(|_| serde_json::json!([])),
        ),
        source: Set(entry.source.to_string()),
        recoverable: Set(entry.recoverable),
        recovered: Set(false),
        recovered_at: Set(None),
        recovered_by: Set(None),
        created_at: Set(Utc::now()),
    }
}

fn from_model(model: dlq_entry::Model) -> Result<DlqEntry, StoreError> {
    let original_payload =
        RawValue::from_string(model.original_payload).map_err(|e| StoreError::Corrupt {
            id: model.dlq_id.clone(),
            reason: format!("original_payload is not valid JSON: {e}"),
        })?;

    // Null or unreadable history degrades to empty rather than hiding the row.
    let retry_history = match serde_json::from_value::<Option<Vec<RetryAttempt>>>(
        model.retry_history,
    ) {
        Ok(history) => history.unwrap_or_default(),
        Err(e) => {
            warn!(dlq_id = %model.dlq_id, error = %e, "Unreadable retry history");
            Vec::new()
        }
    };

    Ok(DlqEntry {
        dlq_id: model.dlq_id,
        original_subject: model.original_subject,
        original_payload,
        reason: model.reason.into(),
        reason_detail: model.reason_detail,
        failed_at: model.failed_at,
        retry_count: u32::try_from(model.retry_count).unwrap_or(0),
        max_retries: u32::try_from(model.max_retries).unwrap_or(0),
        retry_history,
        source: Source::from(model.source),
        recoverable: model.recoverable,
        recovered: model.recovered,
        recovered_at: model.recovered_at,
        recovered_by: model.recovered_by,
    })
}

#[async_trait]
impl DlqStore for SqlDlqStore {
    async fn insert(&self, entry: &DlqEntry) -> Result<(), StoreError> {
        let result = dlq_entry::Entity::insert(to_active_model(entry))
            .on_conflict(
                OnConflict::column(dlq_entry::Column::DlqId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await;

        match result {
            Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, dlq_id: &str) -> Result<DlqEntry, StoreError> {
        let model = dlq_entry::Entity::find_by_id(dlq_id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(dlq_id.to_string()))?;
        from_model(model)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<DlqEntry>, StoreError> {
        let mut query = dlq_entry::Entity::find();

        if let Some(recovered) = filter.recovered {
            query = query.filter(dlq_entry::Column::Recovered.eq(recovered));
        }
        if let Some(reason) = &filter.reason {
            query = query.filter(dlq_entry::Column::Reason.eq(reason.as_str()));
        }
        if let Some(source) = &filter.source {
            query = query.filter(dlq_entry::Column::Source.eq(source.as_str()));
        }

        query
            .order_by_desc(dlq_entry::Column::FailedAt)
            .limit(filter.effective_limit())
            .all(&self.db)
            .await?
            .into_iter()
            .map(from_model)
            .collect()
    }

    async fn list_recoverable(&self) -> Result<Vec<DlqEntry>, StoreError> {
        dlq_entry::Entity::find()
            .filter(dlq_entry::Column::Recoverable.eq(true))
            .filter(dlq_entry::Column::Recovered.eq(false))
            .filter(dlq_entry::Column::FailedAt.gt(recovery_cutoff(self.recovery_window)))
            .order_by_asc(dlq_entry::Column::FailedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(from_model)
            .collect()
    }

    async fn mark_recovered(&self, dlq_id: &str, recovered_by: &str) -> Result<(), StoreError> {
        let result = dlq_entry::Entity::update_many()
            .col_expr(dlq_entry::Column::Recovered, Expr::value(true))
            .col_expr(dlq_entry::Column::RecoveredAt, Expr::value(Utc::now()))
            .col_expr(dlq_entry::Column::RecoveredBy, Expr::value(recovered_by))
            .filter(dlq_entry::Column::DlqId.eq(dlq_id))
            .filter(dlq_entry::Column::Recovered.eq(false))
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            return Ok(());
        }

        let exists = dlq_entry::Entity::find_by_id(dlq_id.to_string())
            .one(&self.db)
            .await?
            .is_some();

        if exists {
            Err(StoreError::AlreadyRecovered(dlq_id.to_string()))
        } else {
            Err(StoreError::NotFound(dlq_id.to_string()))
        }
    }

    async fn stats(&self) -> Result<DlqStats, StoreError> {
        let total = dlq_entry::Entity::find().count(&self.db).await?;

        let unrecovered = dlq_entry::Entity::find()
            .filter(dlq_entry::Column::Recovered.eq(false))
            .count(&self.db)
            .await?;

        let recoverable = dlq_entry::Entity::find()
            .filter(dlq_entry::Column::Recovered.eq(false))
            .filter(dlq_entry::Column::Recoverable.eq(true))
            .count(&self.db)
            .await?;

        Ok(DlqStats {
            total,
            unrecovered,
            recoverable,
            by_reason: self.count_unrecovered_by(dlq_entry::Column::Reason).await?,
            by_source: self.count_unrecovered_by(dlq_entry::Column::Source).await?,
        })
    }
}

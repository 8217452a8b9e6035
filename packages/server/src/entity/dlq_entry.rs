use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A dead-lettered unit of work awaiting (or past) recovery.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dlq_entry")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub dlq_id: String,

    pub original_subject: String,

    /// Original message body exactly as received. Stored as text so the
    /// bytes survive untouched; `jsonb` would normalise them.
    #[sea_orm(column_type = "Text")]
    pub original_payload: String,

    #[sea_orm(indexed)]
    pub reason: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub reason_detail: Option<String>,

    #[sea_orm(indexed)]
    pub failed_at: DateTimeUtc,

    pub retry_count: i32,

    pub max_retries: i32,

    /// Retry history as JSON array: [{attempt, attempted_at, agent, failure_reason}]
    #[sea_orm(column_type = "JsonBinary")]
    pub retry_history: serde_json::Value,

    #[sea_orm(indexed)]
    pub source: String,

    #[sea_orm(default_value = true)]
    pub recoverable: bool,

    #[sea_orm(default_value = false, indexed)]
    pub recovered: bool,

    pub recovered_at: Option<DateTimeUtc>,

    pub recovered_by: Option<String>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

use serde::{Deserialize, Serialize};

use crate::dlq::PassSummary;

/// Query parameters for listing DLQ entries.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ListDlqParams {
    /// Filter by recovery state.
    #[param(example = false)]
    pub recovered: Option<bool>,
    /// Filter by failure reason.
    #[param(example = "no_capable_agent")]
    pub reason: Option<String>,
    /// Filter by source, e.g. `dispatch` or `warren`. Matched literally.
    #[param(example = "dispatch")]
    pub source: Option<String>,
    /// Maximum entries returned (default 50).
    #[param(example = 50)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DlqRetryResponse {
    #[schema(example = "retried")]
    pub status: String,
    #[schema(example = "5f0c9a4e-2f7b-4a7e-9c43-0d2f5e3b9a11")]
    pub dlq_id: String,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DlqDiscardResponse {
    #[schema(example = "discarded")]
    pub status: String,
    #[schema(example = "5f0c9a4e-2f7b-4a7e-9c43-0d2f5e3b9a11")]
    pub dlq_id: String,
}

/// Outcome of a bulk retry.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DlqRetryAllResponse {
    #[schema(example = 3)]
    pub retried: usize,
    #[schema(example = 0)]
    pub failed: usize,
    #[schema(example = 3)]
    pub total: usize,
}

impl From<PassSummary> for DlqRetryAllResponse {
    fn from(s: PassSummary) -> Self {
        Self {
            retried: s.retried,
            failed: s.failed,
            total: s.total,
        }
    }
}

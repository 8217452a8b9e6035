use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single delivery attempt made before a unit of work was dead-lettered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RetryAttempt {
    /// 1-based attempt number.
    #[schema(example = 1)]
    pub attempt: u32,
    /// When this attempt occurred.
    pub attempted_at: DateTime<Utc>,
    /// Agent the work was assigned to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "scout")]
    pub agent: Option<String>,
    /// Why the attempt failed.
    #[schema(example = "agent_unavailable")]
    pub failure_reason: String,
}

impl RetryAttempt {
    pub fn new(attempt: u32, agent: Option<String>, failure_reason: impl Into<String>) -> Self {
        Self {
            attempt,
            attempted_at: Utc::now(),
            agent,
            failure_reason: failure_reason.into(),
        }
    }
}

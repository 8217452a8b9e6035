use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

use crate::retry::RetryAttempt;

/// Bus subjects that dead-letter events are published on.
pub mod subjects {
    pub const TASK_UNASSIGNABLE: &str = "dlq.task.unassignable";
    pub const TASK_NO_AVAILABLE_AGENT: &str = "dlq.task.no_available_agent";
    pub const TASK_POLICY_DENIED: &str = "dlq.task.policy_denied";
    pub const TASK_ASSIGNMENT_TIMEOUT: &str = "dlq.task.assignment_timeout";
    pub const TASK_EXECUTION_TIMEOUT: &str = "dlq.task.execution_timeout";
    pub const TASK_AGENT_CRASHED: &str = "dlq.task.agent_crashed";
    pub const TASK_UNKNOWN: &str = "dlq.task.unknown";
    pub const AGENT_BOOT_FAILURE: &str = "dlq.agent.boot_failure";
    pub const AGENT_PULL_FAILURE: &str = "dlq.agent.pull_failure";
    pub const AGENT_CRASH_LOOP: &str = "dlq.agent.crash_loop";
    pub const AGENT_UNKNOWN: &str = "dlq.agent.unknown";

    /// Prefix shared by every agent-lifecycle subject.
    pub const AGENT_PREFIX: &str = "dlq.agent.";

    /// Every subject a dead-letter event can be routed to, fallbacks included.
    pub const ALL: &[&str] = &[
        TASK_UNASSIGNABLE,
        TASK_NO_AVAILABLE_AGENT,
        TASK_POLICY_DENIED,
        TASK_ASSIGNMENT_TIMEOUT,
        TASK_EXECUTION_TIMEOUT,
        TASK_AGENT_CRASHED,
        TASK_UNKNOWN,
        AGENT_BOOT_FAILURE,
        AGENT_PULL_FAILURE,
        AGENT_CRASH_LOOP,
        AGENT_UNKNOWN,
    ];
}

/// Identifiers recorded in `recovered_by` by the built-in recovery paths.
pub struct RecoveredBy;

impl RecoveredBy {
    /// Single entry retried through the management API.
    pub const API_RETRY: &'static str = "api-retry";
    /// Entry retried by the bulk retry-all endpoint.
    pub const API_RETRY_ALL: &'static str = "api-retry-all";
    /// Entry republished by the background recovery scanner.
    pub const AUTO_SCANNER: &'static str = "auto-scanner";
    /// Entry closed by an operator without republishing.
    pub const MANUAL_DISCARD: &'static str = "manual-discard";
}

/// Why a unit of work was dead-lettered.
///
/// Unrecognised reasons are kept verbatim in [`Reason::Other`] so that stats
/// and filters still see the exact string the producer sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Reason {
    NoCapableAgent,
    AllAgentsUnavailable,
    PolicyDenied,
    TimeoutAssigned,
    TimeoutInProgress,
    AgentCrashed,
    BootFailure,
    HealthCheckFailed,
    PullFailure,
    CrashLoop,
    Other(String),
}

impl Reason {
    /// Every reason with a fixed wire name.
    pub const KNOWN: &'static [Reason] = &[
        Reason::NoCapableAgent,
        Reason::AllAgentsUnavailable,
        Reason::PolicyDenied,
        Reason::TimeoutAssigned,
        Reason::TimeoutInProgress,
        Reason::AgentCrashed,
        Reason::BootFailure,
        Reason::HealthCheckFailed,
        Reason::PullFailure,
        Reason::CrashLoop,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::NoCapableAgent => "no_capable_agent",
            Self::AllAgentsUnavailable => "all_agents_unavailable",
            Self::PolicyDenied => "policy_denied",
            Self::TimeoutAssigned => "timeout_assigned",
            Self::TimeoutInProgress => "timeout_in_progress",
            Self::AgentCrashed => "agent_crashed",
            Self::BootFailure => "boot_failure",
            Self::HealthCheckFailed => "health_check_failed",
            Self::PullFailure => "pull_failure",
            Self::CrashLoop => "crash_loop",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for Reason {
    fn from(s: &str) -> Self {
        match s {
            "no_capable_agent" => Self::NoCapableAgent,
            "all_agents_unavailable" => Self::AllAgentsUnavailable,
            "policy_denied" => Self::PolicyDenied,
            "timeout_assigned" => Self::TimeoutAssigned,
            "timeout_in_progress" => Self::TimeoutInProgress,
            "agent_crashed" => Self::AgentCrashed,
            "boot_failure" => Self::BootFailure,
            "health_check_failed" => Self::HealthCheckFailed,
            "pull_failure" => Self::PullFailure,
            "crash_loop" => Self::CrashLoop,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Reason {
    fn from(s: String) -> Self {
        match Reason::from(s.as_str()) {
            Reason::Other(_) => Reason::Other(s),
            known => known,
        }
    }
}

impl From<Reason> for String {
    fn from(r: Reason) -> Self {
        match r {
            Reason::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subsystem that declared a unit of work dead.
///
/// Values outside the known set are kept verbatim in [`Source::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Source {
    /// Task dispatch: assignment and execution of tasks.
    Dispatch,
    /// Agent lifecycle: booting, pulling and supervising agents.
    Warren,
    Other(String),
}

impl Source {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Dispatch => "dispatch",
            Self::Warren => "warren",
            Self::Other(s) => s,
        }
    }

    /// Infer the source from the subject a message arrived on.
    pub fn from_subject(subject: &str) -> Self {
        if subject.starts_with(subjects::AGENT_PREFIX) {
            Self::Warren
        } else {
            Self::Dispatch
        }
    }
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        match s {
            "dispatch" => Self::Dispatch,
            "warren" => Self::Warren,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        match Source::from(s.as_str()) {
            Source::Other(_) => Source::Other(s),
            known => known,
        }
    }
}

impl From<Source> for String {
    fn from(s: Source) -> Self {
        match s {
            Source::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subject a dead-letter event with the given reason is published on.
///
/// Reasons without a dedicated subject fall back to the unknown subject of the
/// declaring source's namespace. Unrecognised sources use the task namespace.
pub fn subject_for_reason(source: &Source, reason: &Reason) -> &'static str {
    match reason {
        Reason::NoCapableAgent => subjects::TASK_UNASSIGNABLE,
        Reason::AllAgentsUnavailable => subjects::TASK_NO_AVAILABLE_AGENT,
        Reason::PolicyDenied => subjects::TASK_POLICY_DENIED,
        Reason::TimeoutAssigned => subjects::TASK_ASSIGNMENT_TIMEOUT,
        Reason::TimeoutInProgress => subjects::TASK_EXECUTION_TIMEOUT,
        Reason::AgentCrashed => subjects::TASK_AGENT_CRASHED,
        Reason::BootFailure => subjects::AGENT_BOOT_FAILURE,
        Reason::PullFailure => subjects::AGENT_PULL_FAILURE,
        Reason::CrashLoop => subjects::AGENT_CRASH_LOOP,
        Reason::HealthCheckFailed | Reason::Other(_) => match source {
            Source::Warren => subjects::AGENT_UNKNOWN,
            Source::Dispatch | Source::Other(_) => subjects::TASK_UNKNOWN,
        },
    }
}

/// A dead-lettered unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DlqEntry {
    #[schema(example = "5f0c9a4e-2f7b-4a7e-9c43-0d2f5e3b9a11")]
    pub dlq_id: String,
    /// Subject the work was originally published on.
    #[schema(example = "swarm.task.request")]
    pub original_subject: String,
    /// Original message body, re-sent byte for byte on recovery.
    #[schema(value_type = Object)]
    pub original_payload: Box<RawValue>,
    #[schema(value_type = String, example = "no_capable_agent")]
    pub reason: Reason,
    pub reason_detail: Option<String>,
    pub failed_at: DateTime<Utc>,
    #[schema(example = 3)]
    pub retry_count: u32,
    #[schema(example = 3)]
    pub max_retries: u32,
    pub retry_history: Vec<RetryAttempt>,
    #[schema(value_type = String, example = "dispatch")]
    pub source: Source,
    /// Whether the recovery scanner may republish this entry.
    pub recoverable: bool,
    pub recovered: bool,
    pub recovered_at: Option<DateTime<Utc>>,
    #[schema(example = "api-retry")]
    pub recovered_by: Option<String>,
}

impl DlqEntry {
    /// Subject this entry is routed to on the dead-letter bus.
    pub fn dlq_subject(&self) -> &'static str {
        subject_for_reason(&self.source, &self.reason)
    }
}

/// A dead-letter event as received from the bus.
///
/// Producers may leave `source` empty and `retry_history` null; both are
/// filled in by [`DlqEnvelope::into_entry`].
#[derive(Debug, Clone, Deserialize)]
pub struct DlqEnvelope {
    pub dlq_id: String,
    pub original_subject: String,
    pub original_payload: Box<RawValue>,
    pub reason: Reason,
    #[serde(default)]
    pub reason_detail: Option<String>,
    pub failed_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub retry_history: Option<Vec<RetryAttempt>>,
    #[serde(default, deserialize_with = "empty_source_as_none")]
    pub source: Option<Source>,
    #[serde(default)]
    pub recoverable: bool,
}

impl DlqEnvelope {
    /// Build a new, unrecovered entry, inferring the source from `subject`
    /// when the producer did not set one.
    pub fn into_entry(self, subject: &str) -> DlqEntry {
        DlqEntry {
            dlq_id: self.dlq_id,
            original_subject: self.original_subject,
            original_payload: self.original_payload,
            reason: self.reason,
            reason_detail: self.reason_detail,
            failed_at: self.failed_at,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            retry_history: self.retry_history.unwrap_or_default(),
            source: self
                .source
                .unwrap_or_else(|| Source::from_subject(subject)),
            recoverable: self.recoverable,
            recovered: false,
            recovered_at: None,
            recovered_by: None,
        }
    }
}

fn empty_source_as_none<'de, D>(deserializer: D) -> Result<Option<Source>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)?.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => Ok(Some(Source::from(s))),
    }
}

/// Aggregate counts over the dead-letter table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DlqStats {
    #[schema(example = 12)]
    pub total: u64,
    #[schema(example = 5)]
    pub unrecovered: u64,
    /// Entries that are both recoverable and not yet recovered.
    #[schema(example = 3)]
    pub recoverable: u64,
    /// Unrecovered count grouped by reason.
    pub by_reason: HashMap<String, u64>,
    /// Unrecovered count grouped by source.
    pub by_source: HashMap<String, u64>,
}

pub mod config;
pub mod dlq;
pub mod mq;
pub mod publisher;
pub mod retry;

pub use config::MqAppConfig;
pub use dlq::{DlqEntry, DlqEnvelope, DlqStats, Reason, RecoveredBy, Source, subject_for_reason};
pub use mq::{BusPublisher, MqError};
pub use publisher::{DlqPublisher, PublishError, PublishOptions};
pub use retry::RetryAttempt;

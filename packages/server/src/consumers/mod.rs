pub mod dlq_ingest;

pub use dlq_ingest::{consume_dlq_subject, spawn_dlq_consumers};

pub mod dlq_entry;

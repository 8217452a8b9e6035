pub mod memory;
pub mod processor;
pub mod scanner;
pub mod sql;
pub mod store;

pub use memory::MemoryDlqStore;
pub use processor::DlqProcessor;
pub use scanner::{PassSummary, RecoverError, Scanner, ScannerHandle, reconcile, recover_entry};
pub use sql::SqlDlqStore;
pub use store::{DlqStore, ListFilter, StoreError};

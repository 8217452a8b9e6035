use std::sync::Arc;

use common::BusPublisher;

use crate::dlq::DlqStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DlqStore>,
    pub bus: Arc<dyn BusPublisher>,
}

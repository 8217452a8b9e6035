use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{BusPublisher, DlqEntry, DlqStats, MqError, Reason, Source};
use reqwest::Client;
use serde_json::Value;
use sea_orm::DbErr;
use serde_json::value::RawValue;

use dlq_server::config::{CorsConfig, ServerConfig};
use dlq_server::dlq::{DlqProcessor, DlqStore, ListFilter, MemoryDlqStore, StoreError};
use dlq_server::state::AppState;

pub mod routes {
    pub const DLQ: &str = "/api/v1/dlq";
    pub const DLQ_STATS: &str = "/api/v1/dlq/stats";
    pub const DLQ_RETRY_ALL: &str = "/api/v1/dlq/retry-all";

    pub fn dlq_entry(id: &str) -> String {
        format!("/api/v1/dlq/{id}")
    }

    pub fn dlq_retry(id: &str) -> String {
        format!("/api/v1/dlq/{id}/retry")
    }

    pub fn dlq_discard(id: &str) -> String {
        format!("/api/v1/dlq/{id}/discard")
    }
}

/// Bus double that records every publish and can be told to reject subjects.
#[derive(Debug, Default)]
pub struct RecordingBus {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    fail_subjects: Vec<String>,
}

impl RecordingBus {
    pub fn failing_on(subjects: &[&str]) -> Self {
        Self {
            fail_subjects: subjects.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl BusPublisher for RecordingBus {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), MqError> {
        if self.fail_subjects.iter().any(|s| s == subject) {
            return Err(MqError::PublishFailed {
                subject: subject.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.published
            .lock()
            .unwrap()
            .push((subject.to_string(), payload.to_vec()));
        Ok(())
    }
}

/// Store double over a shared memory store whose `mark_recovered` fails with
/// a database error for the given ids.
pub struct FailingMarkStore {
    inner: Arc<MemoryDlqStore>,
    fail_ids: Vec<String>,
}

#[async_trait]
impl DlqStore for FailingMarkStore {
    async fn insert(&self, entry: &DlqEntry) -> Result<(), StoreError> {
        self.inner.insert(entry).await
    }

    async fn get(&self, dlq_id: &str) -> Result<DlqEntry, StoreError> {
        self.inner.get(dlq_id).await
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<DlqEntry>, StoreError> {
        self.inner.list(filter).await
    }

    async fn list_recoverable(&self) -> Result<Vec<DlqEntry>, StoreError> {
        self.inner.list_recoverable().await
    }

    async fn mark_recovered(&self, dlq_id: &str, recovered_by: &str) -> Result<(), StoreError> {
        if self.fail_ids.iter().any(|id| id == dlq_id) {
            return Err(StoreError::Database(DbErr::Custom(
                "connection reset".to_string(),
            )));
        }
        self.inner.mark_recovered(dlq_id, recovered_by).await
    }

    async fn stats(&self) -> Result<DlqStats, StoreError> {
        self.inner.stats().await
    }
}

/// A running test server.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub store: Arc<MemoryDlqStore>,
    pub bus: Arc<RecordingBus>,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_bus(RecordingBus::default()).await
    }

    pub async fn spawn_with_bus(bus: RecordingBus) -> Self {
        let store = Arc::new(MemoryDlqStore::new());
        Self::spawn_with(store.clone(), store, bus).await
    }

    /// Spawn a server whose store fails to mark the given ids recovered.
    pub async fn spawn_with_failing_marks(ids: &[&str]) -> Self {
        let store = Arc::new(MemoryDlqStore::new());
        let failing = Arc::new(FailingMarkStore {
            inner: store.clone(),
            fail_ids: ids.iter().map(|id| id.to_string()).collect(),
        });
        Self::spawn_with(store, failing, RecordingBus::default()).await
    }

    async fn spawn_with(
        store: Arc<MemoryDlqStore>,
        app_store: Arc<dyn DlqStore>,
        bus: RecordingBus,
    ) -> Self {
        let bus = Arc::new(bus);

        let server_config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            base_path: "/api/v1/dlq".to_string(),
            cors: CorsConfig {
                allow_origins: vec![],
                max_age: 3600,
            },
        };

        let state = AppState {
            store: app_store,
            bus: bus.clone(),
        };

        let app = dlq_server::build_router(state, &server_config);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            store,
            bus,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn post(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    /// Store an entry directly, bypassing the bus.
    pub async fn seed(&self, entry: &DlqEntry) {
        self.store
            .insert(entry)
            .await
            .expect("Failed to seed DLQ entry");
    }

    /// Feed a raw bus message through the ingestion path.
    pub async fn ingest(&self, subject: &str, body: &Value) {
        let processor = DlqProcessor::new(self.store.clone());
        processor
            .process(subject, body.to_string().as_bytes())
            .await;
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }

    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}

/// A recoverable dispatch entry that failed `minutes_ago` minutes ago.
pub fn entry(id: &str, reason: Reason, source: Source, minutes_ago: i64) -> DlqEntry {
    DlqEntry {
        dlq_id: id.to_string(),
        original_subject: format!("swarm.task.{id}"),
        original_payload: RawValue::from_string(format!(r#"{{"task_id":"{id}"}}"#)).unwrap(),
        reason,
        reason_detail: None,
        failed_at: Utc::now() - Duration::minutes(minutes_ago),
        retry_count: 3,
        max_retries: 3,
        retry_history: Vec::new(),
        source,
        recoverable: true,
        recovered: false,
        recovered_at: None,
        recovered_by: None,
    }
}

use std::time::Duration;

use common::MqAppConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix every DLQ route is mounted under.
    pub base_path: String,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DlqConfig {
    /// Run the background recovery scanner.
    pub scanner_enabled: bool,
    pub scan_interval_secs: u64,
    /// Failures older than this are left for operators.
    pub recovery_window_secs: u64,
    /// Subscribe to the dead-letter subjects and persist incoming events.
    pub ingest_enabled: bool,
}

impl DlqConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs.max(1))
    }

    pub fn recovery_window(&self) -> Duration {
        Duration::from_secs(self.recovery_window_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
    pub dlq: DlqConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.base_path", "/api/v1/dlq")?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("dlq.scanner_enabled", true)?
            .set_default("dlq.scan_interval_secs", 60)?
            .set_default("dlq.recovery_window_secs", 24 * 60 * 60)?
            .set_default("dlq.ingest_enabled", true)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., DLQ__DATABASE__URL)
            .add_source(Environment::with_prefix("DLQ").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

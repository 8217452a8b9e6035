use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::{info, warn};

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    // Set connection pool options
    opt.max_connections(20)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("dlq_server::entity::*")
        .sync(&db)
        .await?;

    Ok(db)
}

/// Indexes schema-sync cannot express.
const EXTRA_INDEXES: &[(&str, &str)] = &[(
    "idx_dlq_recoverable_pending",
    "CREATE INDEX IF NOT EXISTS idx_dlq_recoverable_pending \
     ON dlq_entry (recoverable, recovered, failed_at) \
     WHERE recoverable = true AND recovered = false",
)];

/// Ensure required database indexes exist.
///
/// Failures are logged and skipped; the service works without them, only slower.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    for (name, sql) in EXTRA_INDEXES {
        match db.execute_unprepared(sql).await {
            Ok(_) => info!("Ensured index {} exists", name),
            Err(e) => warn!("Failed to create index {}: {}", name, e),
        }
    }

    Ok(())
}

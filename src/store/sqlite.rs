use chrono::Utc;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};
use std::path::Path;
use std::str::FromStr;

use crate::error::StorageError;
use crate::model::PriceAlert;
use crate::store::Storage;

/// Name of the single durable record holding the alert collection.
const ALERTS_RECORD: &str = "price_alerts";

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path` and run migrations.
    pub async fn open(path: &Path) -> Result<Self, Report<StorageError>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .change_context(StorageError::Migration)
                .attach_with(|| format!("cannot create data directory: {}", parent.display()))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .change_context(StorageError::Migration)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(opts)
            .await
            .change_context(StorageError::Migration)
            .attach_with(|| format!("database path: {}", path.display()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .change_context(StorageError::Migration)?;

        Ok(Self { pool })
    }
}

impl Storage for SqliteStorage {
    fn load_alerts(&self) -> BoxFuture<'_, Result<Vec<PriceAlert>, Report<StorageError>>> {
        Box::pin(async move {
            let row: Option<(String,)> =
                sqlx::query_as("SELECT payload FROM records WHERE name = ?")
                    .bind(ALERTS_RECORD)
                    .fetch_optional(&self.pool)
                    .await
                    .change_context(StorageError::Read)?;

            match row {
                None => Ok(Vec::new()),
                Some((payload,)) => serde_json::from_str(&payload)
                    .change_context(StorageError::Read)
                    .attach_with(|| format!("record: {ALERTS_RECORD}")),
            }
        })
    }

    fn save_alerts(
        &self,
        alerts: &[PriceAlert],
    ) -> BoxFuture<'_, Result<(), Report<StorageError>>> {
        let alerts = alerts.to_vec();
        Box::pin(async move {
            let payload = serde_json::to_string(&alerts).change_context(StorageError::Write)?;

            // Single-row replace: readers never see a partial collection
            sqlx::query(
                "INSERT OR REPLACE INTO records (name, payload, updated_at) VALUES (?, ?, ?)",
            )
            .bind(ALERTS_RECORD)
            .bind(&payload)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .change_context(StorageError::Write)?;

            Ok(())
        })
    }
}

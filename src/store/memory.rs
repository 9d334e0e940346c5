use error_stack::{Report, bail};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::model::PriceAlert;
use crate::store::Storage;

/// Ephemeral backend holding the collection in process memory.
///
/// Nothing survives a restart; intended for tests and demos. `fail_writes`
/// makes every subsequent save fail, to exercise persistence-failure paths.
pub struct MemoryStorage {
    alerts: Mutex<Vec<PriceAlert>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn load_alerts(&self) -> BoxFuture<'_, Result<Vec<PriceAlert>, Report<StorageError>>> {
        Box::pin(async move { Ok(self.alerts.lock().await.clone()) })
    }

    fn save_alerts(
        &self,
        alerts: &[PriceAlert],
    ) -> BoxFuture<'_, Result<(), Report<StorageError>>> {
        let alerts = alerts.to_vec();
        Box::pin(async move {
            if self.fail_writes.load(Ordering::SeqCst) {
                bail!(StorageError::Write);
            }
            *self.alerts.lock().await = alerts;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AlertCondition;
    use chrono::Utc;

    fn make_alert(id: &str) -> PriceAlert {
        PriceAlert {
            id: id.into(),
            symbol: "AAPL".into(),
            target_price: 180.0,
            condition: AlertCondition::Above,
            is_active: true,
            created_at: Utc::now(),
            note: None,
            triggered: false,
            triggered_at: None,
        }
    }

    #[tokio::test]
    async fn save_replaces_whole_collection() {
        let storage = MemoryStorage::new();
        storage
            .save_alerts(&[make_alert("a"), make_alert("b")])
            .await
            .unwrap();
        storage.save_alerts(&[make_alert("c")]).await.unwrap();

        let loaded = storage.load_alerts().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "c");
    }

    #[tokio::test]
    async fn failing_writes_surface_write_error() {
        let storage = MemoryStorage::new();
        storage.fail_writes(true);
        let err = storage.save_alerts(&[make_alert("a")]).await.unwrap_err();
        assert!(matches!(err.current_context(), StorageError::Write));
        assert!(storage.load_alerts().await.unwrap().is_empty());
    }
}

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt, bail};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{StorageError, StoreError};
use crate::model::{AlertCondition, PriceAlert};

/// Durable backend for the alert collection.
///
/// The whole collection lives under one named record; `save_alerts` replaces
/// it atomically. Uses `BoxFuture` (from `futures` crate) instead of
/// `async fn` in trait to keep the trait object-safe (`dyn Storage`).
pub trait Storage: Send + Sync {
    fn load_alerts(&self) -> BoxFuture<'_, Result<Vec<PriceAlert>, Report<StorageError>>>;

    fn save_alerts(
        &self,
        alerts: &[PriceAlert],
    ) -> BoxFuture<'_, Result<(), Report<StorageError>>>;
}

/// Partial edit of an alert's user-settable rule parameters.
///
/// Applying an edit always re-arms the alert (clears `triggered` /
/// `triggered_at`), even when no field actually changed.
#[derive(Debug, Clone, Default)]
pub struct AlertEdit {
    pub target_price: Option<f64>,
    pub condition: Option<AlertCondition>,
    pub note: Option<String>,
}

/// Owner of the alert collection.
///
/// All operations take one internal mutex, so user mutations and the
/// evaluator's read-then-write cycle are serialized against each other.
/// Every successful mutation writes the full collection to the backend
/// before returning. When that write fails the in-memory change is kept
/// and the caller gets `StoreError::Persistence`: the running session
/// stays usable, durability is best-effort until the next write succeeds.
pub struct AlertStore {
    alerts: Mutex<Vec<PriceAlert>>,
    storage: Arc<dyn Storage>,
}

impl AlertStore {
    /// Load the persisted collection and take ownership of it.
    pub async fn open(storage: Arc<dyn Storage>) -> Result<Self, Report<StorageError>> {
        let alerts = storage.load_alerts().await?;
        Ok(Self {
            alerts: Mutex::new(alerts),
            storage,
        })
    }

    /// All alerts, in storage (insertion) order.
    pub async fn list(&self) -> Vec<PriceAlert> {
        self.alerts.lock().await.clone()
    }

    /// Alerts whose symbol matches exactly, in storage order.
    pub async fn list_by_symbol(&self, symbol: &str) -> Vec<PriceAlert> {
        self.alerts
            .lock()
            .await
            .iter()
            .filter(|a| a.symbol == symbol)
            .cloned()
            .collect()
    }

    pub async fn create(
        &self,
        symbol: &str,
        target_price: f64,
        condition: AlertCondition,
        note: Option<String>,
    ) -> Result<PriceAlert, Report<StoreError>> {
        validate_target_price(target_price)?;

        let alert = PriceAlert {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            target_price,
            condition,
            is_active: true,
            created_at: Utc::now(),
            note,
            triggered: false,
            triggered_at: None,
        };

        let mut alerts = self.alerts.lock().await;
        alerts.push(alert.clone());
        self.persist(&alerts).await?;
        Ok(alert)
    }

    /// Apply `edit` to the alert with `id`. Resets trigger state so the
    /// edited rule can fire again.
    pub async fn update(
        &self,
        id: &str,
        edit: AlertEdit,
    ) -> Result<PriceAlert, Report<StoreError>> {
        if let Some(price) = edit.target_price {
            validate_target_price(price)?;
        }

        let mut alerts = self.alerts.lock().await;
        let alert = find_mut(&mut alerts, id)?;

        if let Some(price) = edit.target_price {
            alert.target_price = price;
        }
        if let Some(condition) = edit.condition {
            alert.condition = condition;
        }
        if let Some(note) = edit.note {
            alert.note = Some(note);
        }
        alert.triggered = false;
        alert.triggered_at = None;

        let updated = alert.clone();
        self.persist(&alerts).await?;
        Ok(updated)
    }

    /// Remove the alert with `id`. No-op when already absent.
    pub async fn delete(&self, id: &str) -> Result<(), Report<StoreError>> {
        let mut alerts = self.alerts.lock().await;
        let before = alerts.len();
        alerts.retain(|a| a.id != id);
        if alerts.len() == before {
            return Ok(());
        }
        self.persist(&alerts).await
    }

    /// Flip evaluation on or off. Does not touch trigger state.
    pub async fn set_active(&self, id: &str, is_active: bool) -> Result<(), Report<StoreError>> {
        let mut alerts = self.alerts.lock().await;
        let alert = find_mut(&mut alerts, id)?;
        alert.is_active = is_active;
        self.persist(&alerts).await
    }

    /// Transition the alert to triggered state.
    ///
    /// Returns the updated alert when this call performed the false→true
    /// transition, `None` when the alert was already triggered (idempotent,
    /// no write happens in that case).
    pub async fn mark_triggered(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PriceAlert>, Report<StoreError>> {
        let mut alerts = self.alerts.lock().await;
        let alert = find_mut(&mut alerts, id)?;
        if alert.triggered {
            return Ok(None);
        }
        alert.triggered = true;
        alert.triggered_at = Some(at);
        let updated = alert.clone();
        self.persist(&alerts).await?;
        Ok(Some(updated))
    }

    /// Re-arm a triggered alert. No-op (no write) when already untriggered.
    pub async fn reset_triggered(&self, id: &str) -> Result<(), Report<StoreError>> {
        let mut alerts = self.alerts.lock().await;
        let alert = find_mut(&mut alerts, id)?;
        if !alert.triggered {
            return Ok(());
        }
        alert.triggered = false;
        alert.triggered_at = None;
        self.persist(&alerts).await
    }

    async fn persist(&self, alerts: &[PriceAlert]) -> Result<(), Report<StoreError>> {
        self.storage
            .save_alerts(alerts)
            .await
            .change_context(StoreError::Persistence)
    }
}

fn find_mut<'a>(
    alerts: &'a mut [PriceAlert],
    id: &str,
) -> Result<&'a mut PriceAlert, Report<StoreError>> {
    alerts
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| Report::new(StoreError::NotFound { id: id.to_string() }))
}

fn validate_target_price(price: f64) -> Result<(), Report<StoreError>> {
    if !price.is_finite() || price <= 0.0 {
        bail!(StoreError::Validation {
            reason: format!("target price must be a finite positive number, got {price}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStorage;

    async fn open_store() -> AlertStore {
        AlertStore::open(Arc::new(MemoryStorage::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_assigns_id_and_defaults() {
        let store = open_store().await;
        let alert = store
            .create("AAPL", 180.0, AlertCondition::Above, Some("note".into()))
            .await
            .unwrap();

        assert!(!alert.id.is_empty());
        assert!(alert.is_active);
        assert!(!alert.triggered);
        assert!(alert.triggered_at.is_none());

        let listed = store.list().await;
        assert_eq!(listed, vec![alert]);
    }

    #[tokio::test]
    async fn create_rejects_non_positive_or_non_finite_target() {
        let store = open_store().await;
        for bad in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let err = store
                .create("AAPL", bad, AlertCondition::Above, None)
                .await
                .unwrap_err();
            assert!(matches!(
                err.current_context(),
                StoreError::Validation { .. }
            ));
        }
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn ids_are_unique_and_not_reused_after_delete() {
        let store = open_store().await;
        let first = store
            .create("AAPL", 180.0, AlertCondition::Above, None)
            .await
            .unwrap();
        store.delete(&first.id).await.unwrap();
        let second = store
            .create("AAPL", 180.0, AlertCondition::Above, None)
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn list_by_symbol_filters_exactly() {
        let store = open_store().await;
        store
            .create("AAPL", 180.0, AlertCondition::Above, None)
            .await
            .unwrap();
        store
            .create("TSLA", 250.0, AlertCondition::Below, None)
            .await
            .unwrap();

        let aapl = store.list_by_symbol("AAPL").await;
        assert_eq!(aapl.len(), 1);
        assert_eq!(aapl[0].symbol, "AAPL");
        assert!(store.list_by_symbol("MSFT").await.is_empty());
    }

    #[tokio::test]
    async fn update_resets_trigger_state() {
        let store = open_store().await;
        let alert = store
            .create("AAPL", 180.0, AlertCondition::Above, None)
            .await
            .unwrap();
        store
            .mark_triggered(&alert.id, Utc::now())
            .await
            .unwrap()
            .unwrap();

        let updated = store
            .update(
                &alert.id,
                AlertEdit {
                    target_price: Some(190.0),
                    ..AlertEdit::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.target_price, 190.0);
        assert!(!updated.triggered);
        assert!(updated.triggered_at.is_none());
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let store = open_store().await;
        let err = store
            .update("missing", AlertEdit::default())
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_rejects_invalid_target_before_mutating() {
        let store = open_store().await;
        let alert = store
            .create("AAPL", 180.0, AlertCondition::Above, None)
            .await
            .unwrap();

        let err = store
            .update(
                &alert.id,
                AlertEdit {
                    target_price: Some(-1.0),
                    ..AlertEdit::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            StoreError::Validation { .. }
        ));
        assert_eq!(store.list().await[0].target_price, 180.0);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = open_store().await;
        let alert = store
            .create("AAPL", 180.0, AlertCondition::Above, None)
            .await
            .unwrap();
        store.delete(&alert.id).await.unwrap();
        store.delete(&alert.id).await.unwrap();
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn set_active_leaves_trigger_state_alone() {
        let store = open_store().await;
        let alert = store
            .create("AAPL", 180.0, AlertCondition::Above, None)
            .await
            .unwrap();
        store
            .mark_triggered(&alert.id, Utc::now())
            .await
            .unwrap()
            .unwrap();

        store.set_active(&alert.id, false).await.unwrap();
        let listed = store.list().await;
        assert!(!listed[0].is_active);
        assert!(listed[0].triggered);
    }

    #[tokio::test]
    async fn mark_triggered_is_idempotent() {
        let store = open_store().await;
        let alert = store
            .create("AAPL", 180.0, AlertCondition::Above, None)
            .await
            .unwrap();

        let at = Utc::now();
        let first = store.mark_triggered(&alert.id, at).await.unwrap();
        assert!(first.is_some());
        assert_eq!(first.unwrap().triggered_at, Some(at));

        let second = store.mark_triggered(&alert.id, Utc::now()).await.unwrap();
        assert!(second.is_none());
        // Original timestamp untouched
        assert_eq!(store.list().await[0].triggered_at, Some(at));
    }

    #[tokio::test]
    async fn reset_triggered_re_arms() {
        let store = open_store().await;
        let alert = store
            .create("AAPL", 180.0, AlertCondition::Above, None)
            .await
            .unwrap();
        store
            .mark_triggered(&alert.id, Utc::now())
            .await
            .unwrap()
            .unwrap();

        store.reset_triggered(&alert.id).await.unwrap();
        let listed = store.list().await;
        assert!(!listed[0].triggered);
        assert!(listed[0].triggered_at.is_none());

        // Re-armed alerts can transition again
        let refired = store.mark_triggered(&alert.id, Utc::now()).await.unwrap();
        assert!(refired.is_some());
    }

    #[tokio::test]
    async fn mutations_persist_to_backend() {
        let storage = Arc::new(MemoryStorage::new());
        let store = AlertStore::open(Arc::clone(&storage) as Arc<dyn Storage>)
            .await
            .unwrap();
        let alert = store
            .create("AAPL", 180.0, AlertCondition::Above, None)
            .await
            .unwrap();

        let persisted = storage.load_alerts().await.unwrap();
        assert_eq!(persisted, vec![alert.clone()]);

        store.delete(&alert.id).await.unwrap();
        assert!(storage.load_alerts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_keeps_in_memory_change() {
        let storage = Arc::new(MemoryStorage::new());
        let store = AlertStore::open(Arc::clone(&storage) as Arc<dyn Storage>)
            .await
            .unwrap();

        storage.fail_writes(true);
        let err = store
            .create("AAPL", 180.0, AlertCondition::Above, None)
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), StoreError::Persistence));

        // Availability over durability: the session still sees the alert
        let listed = store.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].symbol, "AAPL");

        // Next successful write flushes the full current collection
        storage.fail_writes(false);
        store.set_active(&listed[0].id, false).await.unwrap();
        let persisted = storage.load_alerts().await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert!(!persisted[0].is_active);
    }
}

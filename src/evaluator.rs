use chrono::Utc;
use error_stack::Report;
use std::sync::Arc;

use crate::error::{FeedError, StoreError};
use crate::feed::PriceFeed;
use crate::notifier::Dispatcher;
use crate::store::AlertStore;

/// Applies one price sample per tick to every armable alert for a symbol.
pub struct Evaluator {
    store: Arc<AlertStore>,
    feed: Arc<dyn PriceFeed>,
    dispatcher: Arc<Dispatcher>,
}

impl Evaluator {
    pub fn new(
        store: Arc<AlertStore>,
        feed: Arc<dyn PriceFeed>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            store,
            feed,
            dispatcher,
        }
    }

    /// One evaluation cycle: sample the feed, transition every crossed alert
    /// to triggered, and dispatch a notification per transition.
    ///
    /// Store failures are handled here (logged, remaining alerts still
    /// evaluated); only a feed failure propagates, for the scheduler to log.
    pub async fn tick(&self, symbol: &str) -> Result<(), Report<FeedError>> {
        let price = self.feed.sample(symbol).await?;

        let alerts = self.store.list_by_symbol(symbol).await;
        if alerts.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut fired = 0usize;

        for alert in &alerts {
            if !alert.is_armable() || !alert.crossed(price) {
                continue;
            }

            match self.store.mark_triggered(&alert.id, now).await {
                Ok(Some(updated)) => {
                    self.dispatcher.notify(&updated, price).await;
                    fired += 1;
                }
                // Already triggered by an earlier tick; nothing to dispatch
                Ok(None) => {}
                Err(e) if matches!(e.current_context(), StoreError::Persistence) => {
                    // The transition happened in memory; the user still gets
                    // notified, durability catches up on the next write.
                    tracing::warn!(error = ?e, id = %alert.id, "trigger state persisted in memory only");
                    let mut updated = alert.clone();
                    updated.triggered = true;
                    updated.triggered_at = Some(now);
                    self.dispatcher.notify(&updated, price).await;
                    fired += 1;
                }
                Err(e) => {
                    tracing::warn!(error = ?e, id = %alert.id, "trigger transition failed");
                }
            }
        }

        if fired > 0 {
            tracing::info!(symbol, price, fired, "alerts triggered");
        } else {
            tracing::debug!(symbol, price, evaluated = alerts.len(), "tick complete");
        }

        Ok(())
    }
}

use error_stack::Report;
use futures::future::BoxFuture;
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::FeedError;
use crate::feed::PriceFeed;

/// Simulated market: each sample moves the previous price by a uniform step
/// within `±volatility` (fraction, e.g. `0.02` for ±2% per tick).
///
/// Prices stay positive for any `volatility < 1`. There is no external data
/// source in this design; the walk is the authoritative price per symbol.
pub struct RandomWalkFeed {
    volatility: f64,
    default_start: f64,
    last: Mutex<HashMap<String, f64>>,
}

impl RandomWalkFeed {
    pub fn new(volatility: f64, default_start: f64) -> Self {
        Self {
            volatility,
            default_start,
            last: Mutex::new(HashMap::new()),
        }
    }

    /// Preset the starting price for `symbol` before the first sample.
    pub async fn seed(&self, symbol: &str, price: f64) {
        self.last.lock().await.insert(symbol.to_string(), price);
    }
}

impl PriceFeed for RandomWalkFeed {
    fn sample(&self, symbol: &str) -> BoxFuture<'_, Result<f64, Report<FeedError>>> {
        let symbol = symbol.to_string();
        Box::pin(async move {
            let mut last = self.last.lock().await;
            let previous = *last.entry(symbol.clone()).or_insert(self.default_start);
            let step = rand::thread_rng().gen_range(-self.volatility..=self.volatility);
            let next = previous * (1.0 + step);
            last.insert(symbol, next);
            Ok(next)
        })
    }
}

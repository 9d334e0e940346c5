use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::evaluator::Evaluator;

struct Watch {
    symbol: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives periodic evaluation for the symbol currently being observed.
///
/// One watch at a time: starting while already running stops the previous
/// run first. `stop` cancels the pending tick; a tick already executing
/// runs to completion before the task exits.
pub struct Scheduler {
    evaluator: Arc<Evaluator>,
    watch: Mutex<Option<Watch>>,
}

impl Scheduler {
    pub fn new(evaluator: Arc<Evaluator>) -> Self {
        Self {
            evaluator,
            watch: Mutex::new(None),
        }
    }

    pub async fn start(&self, symbol: &str, interval: Duration) {
        let mut watch = self.watch.lock().await;
        if let Some(previous) = watch.take() {
            tracing::info!(symbol = %previous.symbol, "stopping previous watch");
            previous.cancel.cancel();
            let _ = previous.handle.await;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.evaluator),
            symbol.to_string(),
            interval,
            cancel.clone(),
        ));

        tracing::info!(symbol, interval_ms = interval.as_millis() as u64, "watch started");
        *watch = Some(Watch {
            symbol: symbol.to_string(),
            cancel,
            handle,
        });
    }

    /// No-op when already stopped.
    pub async fn stop(&self) {
        let mut watch = self.watch.lock().await;
        if let Some(current) = watch.take() {
            current.cancel.cancel();
            let _ = current.handle.await;
            tracing::info!(symbol = %current.symbol, "watch stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.watch.lock().await.is_some()
    }

    pub async fn watched_symbol(&self) -> Option<String> {
        self.watch.lock().await.as_ref().map(|w| w.symbol.clone())
    }
}

async fn run_loop(
    evaluator: Arc<Evaluator>,
    symbol: String,
    interval: Duration,
    cancel: CancellationToken,
) {
    // First tick one interval after start, then steady cadence
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Prefer cancellation over a tick that became due at the same time
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = evaluator.tick(&symbol).await {
                    tracing::warn!(error = ?e, symbol = %symbol, "tick failed");
                }
            }
        }
    }

    tracing::debug!(symbol = %symbol, "watch loop exited");
}

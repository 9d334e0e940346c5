pub mod terminal;

use error_stack::Report;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::error::NotifyError;
use crate::model::PriceAlert;

/// Desktop-notification capability state, mirroring a sandboxed runtime's
/// permission model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    Unasked,
}

/// Sink for rendering alerts to the user.
///
/// `show_toast` must always be available; `show_desktop` is gated on
/// permission and may fail without affecting the toast channel.
pub trait NotificationSink: Send + Sync {
    fn permission_state(&self) -> PermissionState;

    fn request_permission(&self) -> PermissionState;

    fn show_desktop(
        &self,
        title: &str,
        body: &str,
        dedup_key: &str,
    ) -> Result<(), Report<NotifyError>>;

    fn show_toast(&self, title: &str, body: &str);
}

/// Turns a triggered alert into user-visible notifications.
///
/// Fire-and-forget: `notify` never returns an error. Each crossing — keyed
/// by `(alert id, triggered_at)` — is dispatched at most once, so a re-armed
/// alert's next crossing notifies again while a repeated call for the same
/// crossing is suppressed.
pub struct Dispatcher {
    sink: Arc<dyn NotificationSink>,
    auto_requested: AtomicBool,
    dispatched: Mutex<HashSet<String>>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            auto_requested: AtomicBool::new(false),
            dispatched: Mutex::new(HashSet::new()),
        }
    }

    /// Explicit user-driven permission request.
    pub fn request_permission(&self) -> PermissionState {
        self.sink.request_permission()
    }

    pub async fn notify(&self, alert: &PriceAlert, current_price: f64) {
        let key = crossing_key(alert);
        {
            let mut dispatched = self.dispatched.lock().await;
            if !dispatched.insert(key) {
                tracing::debug!(id = %alert.id, "duplicate dispatch suppressed");
                return;
            }
        }

        let title = format!("{} price alert", alert.symbol);
        let body = format!(
            "crossed {} {:.2}, now {:.2}",
            alert.condition, alert.target_price, current_price
        );

        // Ask once automatically; afterwards only an explicit user action
        // re-requests permission.
        if self.sink.permission_state() == PermissionState::Unasked
            && !self.auto_requested.swap(true, Ordering::SeqCst)
        {
            self.sink.request_permission();
        }

        if self.sink.permission_state() == PermissionState::Granted {
            if let Err(e) = self.sink.show_desktop(&title, &body, &alert.id) {
                tracing::warn!(error = ?e, id = %alert.id, "desktop notification failed");
            }
        }

        // The toast never depends on desktop permission or desktop failures
        self.sink.show_toast(&title, &body);
    }
}

fn crossing_key(alert: &PriceAlert) -> String {
    match alert.triggered_at {
        Some(at) => format!("{}@{}", alert.id, at.timestamp_nanos_opt().unwrap_or_default()),
        None => alert.id.clone(),
    }
}

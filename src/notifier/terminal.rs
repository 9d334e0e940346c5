use error_stack::Report;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::NotifyError;
use crate::notifier::{NotificationSink, PermissionState};

/// Terminal-backed sink: the toast is a WARN log line, the "desktop"
/// notification an INFO line. Permission starts unasked and is always
/// granted on request; there is no OS-level capability to be denied here.
pub struct TerminalSink {
    granted: AtomicBool,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self {
            granted: AtomicBool::new(false),
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for TerminalSink {
    fn permission_state(&self) -> PermissionState {
        if self.granted.load(Ordering::SeqCst) {
            PermissionState::Granted
        } else {
            PermissionState::Unasked
        }
    }

    fn request_permission(&self) -> PermissionState {
        self.granted.store(true, Ordering::SeqCst);
        PermissionState::Granted
    }

    fn show_desktop(
        &self,
        title: &str,
        body: &str,
        dedup_key: &str,
    ) -> Result<(), Report<NotifyError>> {
        tracing::info!(dedup_key, "DESKTOP {title}: {body}");
        Ok(())
    }

    fn show_toast(&self, title: &str, body: &str) {
        tracing::warn!("ALERT {title}: {body}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_starts_unasked_and_grants_on_request() {
        let sink = TerminalSink::new();
        assert_eq!(sink.permission_state(), PermissionState::Unasked);
        assert_eq!(sink.request_permission(), PermissionState::Granted);
        assert_eq!(sink.permission_state(), PermissionState::Granted);
    }

    #[test]
    fn channels_do_not_panic() {
        let sink = TerminalSink::new();
        sink.show_desktop("AAPL price alert", "crossed above 180.00, now 180.50", "a-1")
            .unwrap();
        sink.show_toast("AAPL price alert", "crossed above 180.00, now 180.50");
    }
}

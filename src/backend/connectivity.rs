use std::sync::{Arc, Mutex};

use crate::domain::events::ConnectivityStatus;

/// Shared connection state of the live channel.
#[derive(Clone, Debug)]
pub struct ConnectivityTracker {
    inner: Arc<Mutex<ConnectivityStatus>>,
}

impl Default for ConnectivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ConnectivityStatus::Disconnected)),
        }
    }

    pub fn snapshot(&self) -> ConnectivityStatus {
        self.inner
            .lock()
            .map(|status| *status)
            .unwrap_or(ConnectivityStatus::Disconnected)
    }

    pub fn is_connected(&self) -> bool {
        self.snapshot() == ConnectivityStatus::Connected
    }

    pub fn set(&self, status: ConnectivityStatus) {
        let Ok(mut current) = self.inner.lock() else {
            return;
        };
        if *current == status {
            return;
        }

        tracing::info!(
            code = status_code(status),
            from = ?*current,
            to = ?status,
            "live channel connectivity changed"
        );
        *current = status;
    }
}

fn status_code(status: ConnectivityStatus) -> &'static str {
    match status {
        ConnectivityStatus::Connecting => "LIVE_CONNECTING",
        ConnectivityStatus::Connected => "LIVE_CONNECTED",
        ConnectivityStatus::Disconnected => "LIVE_DISCONNECTED",
    }
}

//! User-facing notifications.
//!
//! Failed requests surface a short transient message to the user. What
//! "showing" means is up to the host: a toast, a status bar, a log line.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shown for error responses whose envelope carries no message.
pub const DEFAULT_ERROR_MESSAGE: &str = "Request failed, please try again later";

/// Shown when no response was received at all.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error, please check your connection";

/// How long a transient notification stays visible by default.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(2);

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub duration: Duration,
}

impl Notification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            duration: DEFAULT_DURATION,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Fire-and-forget sink for notifications.
pub trait Notifier: Send + Sync {
    fn show(&self, notification: Notification);
}

/// Writes notifications to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show(&self, notification: Notification) {
        tracing::warn!(
            message = %notification.message,
            duration_ms = notification.duration.as_millis() as u64,
            "notification"
        );
    }
}

/// Keeps every notification in memory. Useful for tests and headless hosts.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    shown: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown
            .lock()
            .map(|shown| shown.clone())
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.shown().into_iter().map(|n| n.message).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, notification: Notification) {
        if let Ok(mut shown) = self.shown.lock() {
            shown.push(notification);
        }
    }
}

impl<F> Notifier for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn show(&self, notification: Notification) {
        self(notification)
    }
}

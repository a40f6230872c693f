//! One-time desktop notices via notify-rust (D-Bus).

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use notify_rust::Notification;
use tracing::{debug, warn};

pub struct Notifier {
    enabled: bool,
    shown: Mutex<HashSet<&'static str>>,
}

impl Notifier {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            shown: Mutex::new(HashSet::new()),
        }
    }

    pub fn notify(&self, summary: &str, body: &str) {
        if !self.enabled {
            debug!("Notice (suppressed): {summary}");
            return;
        }

        debug!("Notification: {summary}");

        if let Err(e) = Notification::new()
            .summary(summary)
            .body(body)
            .icon("dialog-information")
            .timeout(8000)
            .show()
        {
            warn!("Failed to show notification: {e}");
        }
    }

    /// Show a notice at most once per process, keyed by `tag`.
    pub fn notify_once(&self, tag: &'static str, summary: &str, body: &str) {
        let first = self
            .shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag);
        if first {
            self.notify(summary, body);
        }
    }
}

//! Outcome notifications.
//!
//! Views report every user-visible outcome through a [`Notifier`]. Delivery is
//! fire-and-forget: nothing a sink does can change the view's state.

use serde::Serialize;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

pub trait Notifier: Send + Sync {
    fn notify_success(&self, message: &str);
    fn notify_failure(&self, message: &str);
}

pub type SharedNotifier = Arc<dyn Notifier>;

/// Sends notifications to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_success(&self, message: &str) {
        tracing::info!(target: "homebase::notify", %message, "success");
    }

    fn notify_failure(&self, message: &str) {
        tracing::warn!(target: "homebase::notify", %message, "failure");
    }
}

/// Keeps every notification in order, for inspection after the fact.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Notification> {
        self.entries.lock().ok().and_then(|e| e.last().cloned())
    }

    pub fn failures(&self) -> Vec<String> {
        self.messages(Level::Failure)
    }

    pub fn successes(&self) -> Vec<String> {
        self.messages(Level::Success)
    }

    pub fn clear(&self) {
        if let Ok(mut e) = self.entries.lock() {
            e.clear();
        }
    }

    fn messages(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|n| n.level == level)
            .map(|n| n.message)
            .collect()
    }

    fn push(&self, level: Level, message: &str) {
        if let Ok(mut e) = self.entries.lock() {
            e.push(Notification {
                level,
                message: message.to_string(),
            });
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify_success(&self, message: &str) {
        self.push(Level::Success, message);
    }

    fn notify_failure(&self, message: &str) {
        self.push(Level::Failure, message);
    }
}

//! Notification sinks for the reference runtime.

use std::sync::Mutex;

use async_trait::async_trait;

use pulseguard_contracts::alert::{Notification, NotificationKind};
use pulseguard_core::traits::NotificationSink;

/// Prints every notification to stdout.
pub struct ConsoleSink;

#[async_trait]
impl NotificationSink for ConsoleSink {
    async fn emit(&self, notification: &Notification) {
        println!(
            "  [notify:{}] {}: {}",
            notification.severity, notification.title, notification.body
        );
    }
}

/// Keeps every notification for later inspection, optionally echoing it.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Notification>>,
    echo: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A recording sink that also prints what it receives.
    pub fn echoing() -> Self {
        Self { sent: Mutex::new(Vec::new()), echo: true }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn count_of(&self, kind: NotificationKind) -> usize {
        self.sent().iter().filter(|n| n.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.sent().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn emit(&self, notification: &Notification) {
        if self.echo {
            println!("    -> sink: {}", notification.title);
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
    }
}

//! Alert feed records and sink notifications.
//!
//! An `Alert` is immutable once created except for its `read` flag. A
//! `Notification` is the rendered, best-effort message handed to a
//! Notification Sink; nothing downstream relies on its delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{interaction::Severity, medication::MedicationId};

/// Unique identifier for one alert in a patient's feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertId(pub uuid::Uuid);

impl AlertId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AlertId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    MissedDose,
    LowStock,
    Interaction,
}

/// The content of an alert before the aggregator stamps identity and order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertDraft {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub medication_id: Option<MedicationId>,
}

/// One entry of the alert feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    /// Monotonic position in the feed. Higher is newer.
    pub seq: u64,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub medication_id: Option<MedicationId>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Coarse traffic-light safety status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyStatus {
    Green,
    Yellow,
    Red,
}

/// What caused a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A dose is due within the approaching window.
    DoseApproaching,
    /// A dose is past due but not yet stale.
    DoseOverdue,
    /// A feed alert surfaced by the feed poll.
    FeedAlert,
}

/// A rendered message for a Notification Sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub severity: Severity,
    pub title: String,
    pub body: String,
    pub medication_id: Option<MedicationId>,
    pub alert_id: Option<AlertId>,
    pub created_at: DateTime<Utc>,
}

impl From<&Alert> for Notification {
    fn from(alert: &Alert) -> Self {
        Self {
            kind: NotificationKind::FeedAlert,
            severity: alert.severity,
            title: alert.title.clone(),
            body: alert.message.clone(),
            medication_id: alert.medication_id,
            alert_id: Some(alert.id),
            created_at: alert.created_at,
        }
    }
}

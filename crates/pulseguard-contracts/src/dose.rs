//! Dose events and the normalized due status.
//!
//! Exactly one `DoseEvent` per medication is pending at any time. Logging moves
//! it to `Taken` or `Skipped`; the scheduler infers `Missed`. Terminal events
//! are never modified again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::medication::MedicationId;

/// Lifecycle status of a single scheduled dose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoseEventStatus {
    Pending,
    Taken,
    Skipped,
    Missed,
}

impl DoseEventStatus {
    /// True for every status other than `Pending`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DoseEventStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DoseEventStatus::Pending => "pending",
            DoseEventStatus::Taken => "taken",
            DoseEventStatus::Skipped => "skipped",
            DoseEventStatus::Missed => "missed",
        }
    }
}

impl std::fmt::Display for DoseEventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduled dose of one medication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoseEvent {
    pub id: uuid::Uuid,
    pub medication_id: MedicationId,
    pub scheduled_time: DateTime<Utc>,
    /// When the patient acted on the dose. `None` while pending or when missed.
    pub actual_time: Option<DateTime<Utc>>,
    pub status: DoseEventStatus,
}

impl DoseEvent {
    /// A fresh pending event for `medication_id` due at `scheduled_time`.
    pub fn pending(medication_id: MedicationId, scheduled_time: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            medication_id,
            scheduled_time,
            actual_time: None,
            status: DoseEventStatus::Pending,
        }
    }
}

/// The normalized due status of one medication at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueStatus {
    pub medication_id: MedicationId,
    /// `None` for a deactivated medication.
    pub next_dose_time: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    /// Whole minutes past `next_dose_time`; 0 unless overdue.
    pub minutes_overdue: i64,
    pub is_low_stock: bool,
}

//! Override acknowledgments for actions blocked by a critical interaction.
//!
//! An `Acknowledgment` is bound to the fingerprint of the exact candidate,
//! active set and findings the caller was shown. It cannot be replayed
//! against a different set. Every honoured acknowledgment becomes an
//! `OverrideRecord` in the override ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{interaction::InteractionFinding, medication::MedicationId};

/// Caller-supplied consent to proceed despite critical findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgment {
    /// The fingerprint returned with the blocking findings.
    pub fingerprint: String,
    /// Who accepted the risk (user, caregiver or clinician identifier).
    pub acknowledged_by: String,
    pub reason: String,
}

/// An action the safety gate can block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GuardedAction {
    AddMedication { candidate: String },
    LogTaken { medication_id: MedicationId, medication_name: String },
}

impl std::fmt::Display for GuardedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardedAction::AddMedication { candidate } => write!(f, "add medication '{candidate}'"),
            GuardedAction::LogTaken { medication_name, .. } => {
                write!(f, "log '{medication_name}' as taken")
            }
        }
    }
}

/// An immutable record of one honoured override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub id: uuid::Uuid,
    pub action: GuardedAction,
    pub fingerprint: String,
    /// The critical findings the acknowledger accepted.
    pub findings: Vec<InteractionFinding>,
    pub acknowledged_by: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

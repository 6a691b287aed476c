//! Error taxonomy for the PulseGuard monitoring core.
//!
//! All fallible operations return `PulseGuardResult<T>`. Lookup failures are
//! operational and carry enough detail to retry or warn the user; schedule
//! configuration errors are rejected at the input boundary.

use thiserror::Error;

use crate::interaction::InteractionFinding;

/// The unified error type for the PulseGuard crates.
#[derive(Debug, Error)]
pub enum PulseGuardError {
    /// A half-life, frequency or horizon is non-positive or not finite.
    #[error("invalid schedule configuration: {reason}")]
    InvalidScheduleConfig { reason: String },

    /// An external interaction or drug info call failed or timed out.
    ///
    /// The result is unknown. It must never be treated as "no findings".
    #[error("{service} lookup unavailable for '{subject}': {reason}")]
    LookupUnavailable {
        service: String,
        subject: String,
        reason: String,
    },

    /// A critical finding blocks the action until an acknowledgment bound to
    /// `fingerprint` is supplied.
    #[error(
        "blocked by {} critical interaction(s): {}",
        .findings.len(),
        describe_findings(.findings)
    )]
    BlockedByInteraction {
        findings: Vec<InteractionFinding>,
        fingerprint: String,
    },

    /// The acknowledgment was issued for a different candidate or active set.
    #[error("acknowledgment is stale (issued for {supplied}, current set is {expected}); re-request it")]
    StaleAcknowledgment { expected: String, supplied: String },

    /// An illegal dose-event transition was requested.
    #[error("state machine error: {reason}")]
    StateMachineError { reason: String },

    #[error("medication '{id}' is not tracked")]
    MedicationNotFound { id: String },

    #[error("alert '{id}' does not exist")]
    AlertNotFound { id: String },

    /// The Medication Store rejected or timed out a write or read.
    #[error("medication store failed: {reason}")]
    StoreFailed { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The override ledger could not persist a record.
    ///
    /// An override that cannot be logged cannot proceed.
    #[error("override write failed: {reason}")]
    AuditWriteFailed { reason: String },
}

/// Convenience alias used throughout the PulseGuard crates.
pub type PulseGuardResult<T> = Result<T, PulseGuardError>;

fn describe_findings(findings: &[InteractionFinding]) -> String {
    findings
        .iter()
        .map(|f| format!("{} ({})", f.pair_key(), f.description))
        .collect::<Vec<_>>()
        .join("; ")
}

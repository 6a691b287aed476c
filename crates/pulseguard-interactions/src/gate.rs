//! The safety gate in front of guarded actions.
//!
//! An action with no critical findings passes. An action with critical
//! findings is refused with `BlockedByInteraction` unless the caller supplies
//! an acknowledgment whose fingerprint matches the current one; a mismatched
//! fingerprint is `StaleAcknowledgment`. An honoured acknowledgment is
//! written to the override ledger before the action may proceed, and a
//! failed write refuses the action.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use pulseguard_contracts::{
    acknowledgment::{Acknowledgment, GuardedAction, OverrideRecord},
    error::{PulseGuardError, PulseGuardResult},
    interaction::InteractionFinding,
};
use pulseguard_core::traits::OverrideWriter;

#[derive(Clone)]
pub struct SafetyGate {
    writer: Arc<dyn OverrideWriter>,
}

impl SafetyGate {
    pub fn new(writer: Arc<dyn OverrideWriter>) -> Self {
        Self { writer }
    }

    /// Decide whether `action` may proceed.
    ///
    /// Returns `Ok(None)` when nothing blocks it and `Ok(Some(record))` when
    /// it proceeds under a recorded override.
    pub fn authorize(
        &self,
        action: GuardedAction,
        critical: &[InteractionFinding],
        fingerprint: &str,
        acknowledgment: Option<&Acknowledgment>,
        now: DateTime<Utc>,
    ) -> PulseGuardResult<Option<OverrideRecord>> {
        if critical.is_empty() {
            return Ok(None);
        }

        let Some(ack) = acknowledgment else {
            warn!(action = %action, findings = critical.len(), "action blocked by critical interaction");
            return Err(PulseGuardError::BlockedByInteraction {
                findings: critical.to_vec(),
                fingerprint: fingerprint.to_string(),
            });
        };

        if ack.fingerprint != fingerprint {
            warn!(
                action = %action,
                supplied = %ack.fingerprint,
                expected = %fingerprint,
                "stale acknowledgment rejected"
            );
            return Err(PulseGuardError::StaleAcknowledgment {
                expected: fingerprint.to_string(),
                supplied: ack.fingerprint.clone(),
            });
        }

        let record = OverrideRecord {
            id: uuid::Uuid::new_v4(),
            action,
            fingerprint: fingerprint.to_string(),
            findings: critical.to_vec(),
            acknowledged_by: ack.acknowledged_by.clone(),
            reason: ack.reason.clone(),
            timestamp: now,
        };
        self.writer.write(&record)?;

        info!(
            action = %record.action,
            acknowledged_by = %record.acknowledged_by,
            "critical interaction overridden"
        );
        Ok(Some(record))
    }
}

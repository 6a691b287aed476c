//! In-memory implementation of `OverrideWriter`.
//!
//! `InMemoryOverrideLedger` keeps every entry in a `Vec` behind a `Mutex`,
//! so the monitor can write from any task while a caregiver view exports or
//! verifies the chain.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::info;

use pulseguard_contracts::{
    acknowledgment::OverrideRecord,
    error::{PulseGuardError, PulseGuardResult},
};
use pulseguard_core::traits::OverrideWriter;

use crate::{
    chain::{hash_entry, verify_chain},
    event::{LedgerEntry, OverrideLog},
};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct LedgerState {
    /// All entries written so far, in append order.
    pub(crate) entries: Vec<LedgerEntry>,

    /// The next sequence number to assign.
    pub(crate) sequence: u64,

    /// The `this_hash` of the last entry, or `GENESIS_HASH` before any write.
    pub(crate) last_hash: String,
}

// ── Public ledger ─────────────────────────────────────────────────────────────

/// An in-memory, append-only override ledger backed by a SHA-256 hash chain.
#[derive(Clone)]
pub struct InMemoryOverrideLedger {
    ledger_id: String,
    pub(crate) state: Arc<Mutex<LedgerState>>,
}

impl InMemoryOverrideLedger {
    pub fn new(ledger_id: impl Into<String>) -> Self {
        let state = LedgerState {
            entries: Vec::new(),
            sequence: 0,
            last_hash: LedgerEntry::GENESIS_HASH.to_string(),
        };
        Self {
            ledger_id: ledger_id.into(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    // Reads tolerate a poisoned lock: the chain itself detects corruption.
    fn read(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every record written so far, oldest first.
    pub fn records(&self) -> Vec<OverrideRecord> {
        self.read().entries.iter().map(|e| e.record.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export a sealed `OverrideLog` of every entry written so far.
    pub fn export_log(&self) -> OverrideLog {
        let state = self.read();
        OverrideLog {
            ledger_id: self.ledger_id.clone(),
            entries: state.entries.clone(),
            exported_at: Utc::now(),
            terminal_hash: state
                .entries
                .last()
                .map(|e| e.this_hash.clone())
                .unwrap_or_default(),
        }
    }

    /// Verify that the in-memory chain has not been tampered with.
    pub fn verify_integrity(&self) -> bool {
        verify_chain(&self.read().entries)
    }
}

// ── OverrideWriter impl ───────────────────────────────────────────────────────

impl OverrideWriter for InMemoryOverrideLedger {
    /// Append one override record to the chain.
    ///
    /// Returns `Err(AuditWriteFailed)` if the lock is poisoned or the record
    /// cannot be hashed. Nothing is appended in either case.
    fn write(&self, record: &OverrideRecord) -> PulseGuardResult<()> {
        let mut state = self.state.lock().map_err(|e| PulseGuardError::AuditWriteFailed {
            reason: format!("override ledger lock poisoned: {}", e),
        })?;

        let prev_hash = state.last_hash.clone();
        let sequence = state.sequence;
        let this_hash = hash_entry(&self.ledger_id, sequence, record, &prev_hash)?;

        state.entries.push(LedgerEntry {
            sequence,
            ledger_id: self.ledger_id.clone(),
            record: record.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.sequence += 1;
        state.last_hash = this_hash;

        info!(
            ledger_id = %self.ledger_id,
            sequence,
            action = %record.action,
            acknowledged_by = %record.acknowledged_by,
            findings = record.findings.len(),
            "override recorded"
        );

        Ok(())
    }
}

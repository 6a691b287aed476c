//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. ledger_id as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. canonical JSON of the override record

use sha2::{Digest, Sha256};

use pulseguard_contracts::{
    acknowledgment::OverrideRecord,
    error::{PulseGuardError, PulseGuardResult},
};

use crate::event::LedgerEntry;

/// Compute the SHA-256 hash for a single ledger entry.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_entry(
    ledger_id: &str,
    sequence: u64,
    record: &OverrideRecord,
    prev_hash: &str,
) -> PulseGuardResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| PulseGuardError::AuditWriteFailed {
        reason: format!("override record is not serializable: {}", e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(ledger_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify the integrity of a hash chain.
///
/// Valid when every entry's `prev_hash` links to the preceding entry (or
/// `GENESIS_HASH` for the first), every `this_hash` matches the value
/// recomputed from its own fields, and sequences run 0, 1, 2, ... without
/// gaps. An empty chain is valid.
pub fn verify_chain(entries: &[LedgerEntry]) -> bool {
    let mut expected_prev = LedgerEntry::GENESIS_HASH.to_string();

    for (position, entry) in entries.iter().enumerate() {
        if entry.sequence != position as u64 || entry.prev_hash != expected_prev {
            return false;
        }

        match hash_entry(&entry.ledger_id, entry.sequence, &entry.record, &entry.prev_hash) {
            Ok(recomputed) if recomputed == entry.this_hash => {}
            _ => return false,
        }

        expected_prev = entry.this_hash.clone();
    }

    true
}

//! Ledger entry and exported log types.
//!
//! `LedgerEntry` wraps one `OverrideRecord` with its position in the chain
//! and the SHA-256 hashes that make tampering detectable. `OverrideLog` is
//! the sealed copy produced by `export_log`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pulseguard_contracts::acknowledgment::OverrideRecord;

/// A single entry in the override hash chain.
///
/// Modifying any field, including those of the embedded `record`,
/// invalidates `this_hash` and every later `prev_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    /// The ledger (normally one per patient) this entry belongs to.
    pub ledger_id: String,

    pub record: OverrideRecord,

    /// Hash of the previous entry, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    /// SHA-256 (hex) over (ledger_id, sequence, prev_hash, record JSON).
    pub this_hash: String,
}

impl LedgerEntry {
    /// The sentinel `prev_hash` of the first entry in every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed copy of an override ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideLog {
    pub ledger_id: String,

    /// Every entry in chain order.
    pub entries: Vec<LedgerEntry>,

    pub exported_at: DateTime<Utc>,

    /// The `this_hash` of the last entry. Empty when the ledger is empty.
    pub terminal_hash: String,
}

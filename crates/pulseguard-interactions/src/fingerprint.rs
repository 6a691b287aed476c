//! Acknowledgment fingerprints.
//!
//! A fingerprint commits to exactly what a caller was shown when an action
//! was blocked: the subject of the action, the active medication set and the
//! blocking findings. Any change to one of the three yields a new value.
//!
//! Hash input layout (UTF-8 lines, in order):
//!   1. `subject:` + normalized subject name
//!   2. `active:` + sorted medication ids, comma separated
//!   3. `finding:` + `pair|severity`, one line per finding, sorted

use sha2::{Digest, Sha256};

use pulseguard_contracts::{
    interaction::{normalize_name, InteractionFinding},
    medication::MedicationId,
};

/// SHA-256 (lowercase hex) over the subject, active set and findings.
///
/// Input order does not matter for ids or findings.
pub fn fingerprint(subject: &str, active_ids: &[MedicationId], findings: &[InteractionFinding]) -> String {
    let mut ids: Vec<String> = active_ids.iter().map(|id| id.to_string()).collect();
    ids.sort();
    ids.dedup();

    let mut keys: Vec<String> = findings
        .iter()
        .map(|f| format!("{}|{}", f.pair_key(), f.severity))
        .collect();
    keys.sort();
    keys.dedup();

    let mut hasher = Sha256::new();
    hasher.update(format!("subject:{}\n", normalize_name(subject)).as_bytes());
    hasher.update(format!("active:{}\n", ids.join(",")).as_bytes());
    for key in &keys {
        hasher.update(format!("finding:{key}\n").as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Fingerprint of an active set alone, used to detect set changes.
pub fn active_set_fingerprint(active_ids: &[MedicationId]) -> String {
    fingerprint("", active_ids, &[])
}

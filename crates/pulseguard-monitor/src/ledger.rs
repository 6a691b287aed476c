//! The reminder dedup ledger.
//!
//! One entry per `(medication, trigger instant, trigger kind)` that has
//! already produced a notification or alert. The ledger is bounded: entries
//! are released once their trigger instant is more than the grace window in
//! the past and their condition no longer holds, entries of untracked
//! medications are released on the next pass, and at capacity the entry
//! with the oldest trigger instant is evicted.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use pulseguard_contracts::medication::MedicationId;

/// What a ledger entry was emitted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    DoseApproaching,
    DoseOverdue,
    MissedDose,
    LowStock,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerKey {
    pub medication_id: MedicationId,
    /// The due time for dose triggers, the stock change time for low stock.
    pub trigger_instant: DateTime<Utc>,
    pub kind: TriggerKind,
}

impl LedgerKey {
    pub fn new(medication_id: MedicationId, trigger_instant: DateTime<Utc>, kind: TriggerKind) -> Self {
        Self { medication_id, trigger_instant, kind }
    }
}

#[derive(Debug, Clone)]
pub struct ReminderLedger {
    /// Key → instant it was claimed.
    entries: HashMap<LedgerKey, DateTime<Utc>>,
    capacity: usize,
    grace: Duration,
}

impl ReminderLedger {
    pub fn new(capacity: usize, grace: Duration) -> Self {
        Self { entries: HashMap::new(), capacity: capacity.max(1), grace }
    }

    /// Record `key` as emitted. Returns `false` if it already was.
    pub fn try_claim(&mut self, key: LedgerKey, now: DateTime<Utc>) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(key, now);
        true
    }

    pub fn contains(&self, key: &LedgerKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release expired entries. Returns how many were dropped.
    ///
    /// An entry is dropped when its medication is no longer `tracked`, or
    /// when its trigger instant is older than the grace window and
    /// `still_holds` reports its condition gone.
    pub fn release(
        &mut self,
        now: DateTime<Utc>,
        tracked: impl Fn(MedicationId) -> bool,
        still_holds: impl Fn(&LedgerKey) -> bool,
    ) -> usize {
        let before = self.entries.len();
        let grace = self.grace;
        self.entries.retain(|key, _| {
            if !tracked(key.medication_id) {
                return false;
            }
            let within_grace = key
                .trigger_instant
                .checked_add_signed(grace)
                .map_or(true, |until| until >= now);
            within_grace || still_holds(key)
        });
        let released = before - self.entries.len();
        if released > 0 {
            debug!(released, remaining = self.entries.len(), "reminder ledger entries released");
        }
        released
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .keys()
            .min_by_key(|k| k.trigger_instant)
            .cloned();
        if let Some(key) = oldest {
            warn!(
                capacity = self.capacity,
                medication_id = %key.medication_id,
                trigger_instant = %key.trigger_instant,
                "reminder ledger full, evicting oldest entry"
            );
            self.entries.remove(&key);
        }
    }
}

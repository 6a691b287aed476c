//! # pulseguard-audit
//!
//! Append-only, SHA-256 hash-chained ledger of honoured safety overrides.
//!
//! ## Overview
//!
//! Every time a caller proceeds past a critical interaction with an
//! acknowledgment, the monitor writes an `OverrideRecord` here. Each record
//! is wrapped in a `LedgerEntry` linked to the previous entry by its hash,
//! so editing or removing a past override is detected by `verify_chain`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pulseguard_audit::InMemoryOverrideLedger;
//! use pulseguard_core::traits::OverrideWriter;
//!
//! let ledger = InMemoryOverrideLedger::new("patient-0042");
//! ledger.write(&record)?;
//! assert!(ledger.verify_integrity());
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_entry, verify_chain};
pub use event::{LedgerEntry, OverrideLog};
pub use memory::InMemoryOverrideLedger;

// ── Tests ─────────────────────────────────────────────────────────────────────

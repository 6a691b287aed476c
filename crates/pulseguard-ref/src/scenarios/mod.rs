//! PulseGuard reference scenarios.
//!
//! Each scenario is a self-contained module that wires real PulseGuard
//! components (monitor, interaction matrix, safety gate, override ledger)
//! to the in-memory collaborators and walks through one safety pattern.

use std::sync::Arc;

use pulseguard_audit::InMemoryOverrideLedger;
use pulseguard_contracts::{
    error::PulseGuardResult,
    interaction::{CheckStatus, InteractionFinding},
};
use pulseguard_core::traits::NotificationSink;
use pulseguard_monitor::{Collaborators, PatientMonitor};
use pulseguard_policy::SafetyPolicy;

use crate::{
    mock_data::{demo_patient, MockDrugInfo, MockInteractionLookup},
    store::InMemoryMedicationStore,
};

pub mod degraded_lookup;
pub mod interaction_block;
pub mod live_session;
pub mod reminder_dedup;

/// Embedded reference safety policy.
const SAFETY_POLICY: &str = include_str!("../../policies/safety.toml");

/// Parse the embedded reference policy.
pub fn reference_policy() -> PulseGuardResult<SafetyPolicy> {
    SafetyPolicy::from_toml_str(SAFETY_POLICY)
}

/// A monitor for the demo patient plus inspectable handles on every
/// collaborator it was wired to.
pub struct Harness {
    pub monitor: Arc<PatientMonitor>,
    pub store: InMemoryMedicationStore,
    pub lookup: Arc<MockInteractionLookup>,
    pub overrides: Arc<InMemoryOverrideLedger>,
}

impl Harness {
    pub async fn new(policy: SafetyPolicy, sink: Arc<dyn NotificationSink>) -> PulseGuardResult<Self> {
        let store = InMemoryMedicationStore::new();
        let lookup = Arc::new(MockInteractionLookup::new());
        let overrides = Arc::new(InMemoryOverrideLedger::new(demo_patient().to_string()));

        let monitor = PatientMonitor::load(
            demo_patient(),
            policy,
            Collaborators {
                store: Arc::new(store.clone()),
                lookup: lookup.clone(),
                drug_info: Arc::new(MockDrugInfo),
                sink,
                overrides: overrides.clone(),
            },
        )
        .await?;

        Ok(Self { monitor: Arc::new(monitor), store, lookup, overrides })
    }
}

// ── Printing helpers ─────────────────────────────────────────────────────────

pub(crate) fn print_findings(findings: &[InteractionFinding]) {
    for f in findings {
        println!("      - {} [{}] {} (source: {})", f.pair_key(), f.severity, f.description, f.source);
    }
}

pub(crate) fn describe_status(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Clear => "CLEAR (every pair checked, nothing found)",
        CheckStatus::InteractionsFound => "INTERACTIONS FOUND",
        CheckStatus::Incomplete => "INCOMPLETE (interaction check incomplete, safety unknown)",
    }
}

pub(crate) fn print_feed(monitor: &PatientMonitor) {
    let alerts = monitor.unread_alerts();
    println!("  Alert feed ({} unread):", alerts.len());
    for a in alerts {
        println!("      #{} [{}] {}", a.seq, a.severity, a.title);
    }
}

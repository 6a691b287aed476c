//! Scenario 1: Critical Interaction Block
//!
//! Demonstrates the safety gate refusing actions while a critical interaction
//! exists, and accepting them only under a recorded, fingerprint-bound
//! override.
//!
//! Walk-through for the demo run:
//!   1. Warfarin is added to an empty medication set
//!   2. Aspirin is checked as a candidate: one critical finding
//!   3. Adding Aspirin without an acknowledgment is refused and alerted
//!   4. An acknowledgment with a stale fingerprint is rejected
//!   5. The matching acknowledgment is honoured and written to the ledger
//!   6. Logging Warfarin as taken is gated the same way
//!   7. The background check turns the safety status red
//!   8. Override ledger integrity is verified

use std::sync::Arc;

use chrono::{Duration, Utc};

use pulseguard_contracts::{
    acknowledgment::Acknowledgment,
    alert::SafetyStatus,
    dose::DoseEventStatus,
    error::{PulseGuardError, PulseGuardResult},
};
use pulseguard_interactions::CandidateDrug;

use super::{describe_status, print_feed, print_findings, reference_policy, Harness};
use crate::{mock_data::prescription, sinks::RecordingSink};

/// What the scenario observed.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionBlockReport {
    pub add_blocked: bool,
    pub stale_rejected: bool,
    pub taken_blocked: bool,
    pub overrides_recorded: usize,
    pub ledger_verified: bool,
    pub status: SafetyStatus,
}

fn acknowledgment(fingerprint: &str) -> Acknowledgment {
    Acknowledgment {
        fingerprint: fingerprint.to_string(),
        acknowledged_by: "dr.rivera".to_string(),
        reason: "INR monitored weekly; low-dose aspirin for secondary prevention".to_string(),
    }
}

/// Run Scenario 1: Critical Interaction Block.
pub async fn run_scenario() -> PulseGuardResult<InteractionBlockReport> {
    println!("=== Scenario 1: Critical Interaction Block ===");
    println!();

    let harness = Harness::new(reference_policy()?, Arc::new(RecordingSink::new())).await?;
    let monitor = &harness.monitor;
    let t0 = Utc::now();

    // ── Step 1: existing therapy ─────────────────────────────────────────────

    let warfarin = monitor
        .add_medication(prescription("Warfarin", 5.0, "mg", 24.0, Some(40.0), 30.0), None, t0)
        .await?
        .medication;
    println!("  [1] Added Warfarin 5 mg every 24h (half-life 40h)");

    // ── Step 2: candidate check ──────────────────────────────────────────────

    let check = monitor.check_candidate(&CandidateDrug::named("Aspirin"), t0).await;
    println!("  [2] Candidate check for Aspirin: {}", describe_status(check.status()));
    print_findings(&check.critical_interactions);

    // ── Step 3: blocked add ──────────────────────────────────────────────────

    let aspirin = prescription("Aspirin", 81.0, "mg", 24.0, Some(4.0), 90.0);
    let fingerprint = match monitor.add_medication(aspirin.clone(), None, t0).await {
        Err(PulseGuardError::BlockedByInteraction { findings, fingerprint }) => {
            println!("  [3] Add Aspirin without acknowledgment: BLOCKED ({} finding(s))", findings.len());
            Some(fingerprint)
        }
        Err(e) => return Err(e),
        Ok(_) => {
            println!("  [3] Add Aspirin without acknowledgment: unexpectedly allowed");
            None
        }
    };
    let add_blocked = fingerprint.is_some();
    let fingerprint = fingerprint.unwrap_or_default();
    println!("      fingerprint: {}", &fingerprint[..fingerprint.len().min(16)]);

    // ── Step 4: stale acknowledgment ─────────────────────────────────────────

    let stale = monitor
        .add_medication(aspirin.clone(), Some(&acknowledgment("0000-stale")), t0)
        .await;
    let stale_rejected = matches!(stale, Err(PulseGuardError::StaleAcknowledgment { .. }));
    println!(
        "  [4] Add Aspirin with a stale acknowledgment: {}",
        if stale_rejected { "REJECTED" } else { "accepted" }
    );

    // ── Step 5: honoured override ────────────────────────────────────────────

    let added = monitor
        .add_medication(aspirin, Some(&acknowledgment(&fingerprint)), t0)
        .await?;
    println!(
        "  [5] Add Aspirin with matching acknowledgment: ALLOWED (override recorded: {})",
        added.override_record.is_some()
    );

    // ── Step 6: gated dose log ───────────────────────────────────────────────

    let at = t0 + Duration::minutes(10);
    let taken_fingerprint = match monitor.log_dose(warfarin.id, DoseEventStatus::Taken, at, None).await {
        Err(PulseGuardError::BlockedByInteraction { fingerprint, .. }) => Some(fingerprint),
        Err(e) => return Err(e),
        Ok(_) => None,
    };
    let taken_blocked = taken_fingerprint.is_some();
    println!(
        "  [6] Log Warfarin as taken: {}",
        if taken_blocked { "BLOCKED, confirmation required" } else { "allowed" }
    );
    if let Some(fp) = taken_fingerprint {
        let logged = monitor
            .log_dose(warfarin.id, DoseEventStatus::Taken, at, Some(&acknowledgment(&fp)))
            .await?;
        println!(
            "      confirmed: stock {} -> {}, next dose {}",
            logged.dose.stock_before,
            logged.dose.stock_after,
            logged.dose.next_pending.scheduled_time.format("%H:%M UTC")
        );
    }

    // ── Step 7: background check ─────────────────────────────────────────────

    let tick = monitor.tick(at + Duration::minutes(1)).await;
    let summary = monitor.safety_summary();
    println!(
        "  [7] Scheduler tick: interaction check {:?}, status {:?}, compliance {}%",
        tick.interaction_check, summary.status, summary.compliance_percent
    );
    print_feed(monitor);

    // ── Step 8: ledger integrity ─────────────────────────────────────────────

    let ledger_verified = harness.overrides.verify_integrity();
    let log = harness.overrides.export_log();
    println!();
    println!(
        "  Override ledger integrity: {} ({} override(s) in chain)",
        if ledger_verified { "VERIFIED" } else { "FAILED" },
        log.entries.len()
    );
    println!();
    println!("  Scenario 1 complete.");
    println!();

    Ok(InteractionBlockReport {
        add_blocked,
        stale_rejected,
        taken_blocked,
        overrides_recorded: harness.overrides.len(),
        ledger_verified,
        status: summary.status,
    })
}

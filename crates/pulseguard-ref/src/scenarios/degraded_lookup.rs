//! Scenario 3: Degraded Interaction Lookup
//!
//! Shows that a failing or stalled interaction service is reported as an
//! incomplete check, never as "no issues found", and that the local
//! pharmacokinetic overlap check still blocks a known critical combination
//! while the service is down.
//!
//! Walk-through for the demo run:
//!   1. Warfarin and Lisinopril are added with the service healthy
//!   2. The service goes down; Ibuprofen is still blocked by the overlap check
//!   3. Amoxicillin is added, with the check reported as incomplete
//!   4. Ticks re-check while degraded; one "incomplete" alert, no repeats
//!   5. The service recovers but one pair stalls past the call timeout
//!   6. Full recovery: the next tick completes the check

use std::sync::Arc;

use chrono::{Duration, Utc};

use pulseguard_contracts::{
    alert::AlertType,
    error::{PulseGuardError, PulseGuardResult},
    interaction::CheckStatus,
};

use super::{describe_status, print_feed, print_findings, reference_policy, Harness};
use crate::{mock_data::prescription, sinks::RecordingSink};

/// Short enough for the stalled pair to time out quickly in the demo.
const DEMO_LOOKUP_TIMEOUT_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq)]
pub struct DegradedLookupReport {
    pub overlap_blocked: bool,
    pub degraded_add_status: CheckStatus,
    pub checks: Vec<Option<CheckStatus>>,
    pub incomplete_alerts: usize,
}

/// Run Scenario 3: Degraded Interaction Lookup.
pub async fn run_scenario() -> PulseGuardResult<DegradedLookupReport> {
    println!("=== Scenario 3: Degraded Interaction Lookup ===");
    println!();

    let mut policy = reference_policy()?;
    policy.lookup.timeout_ms = DEMO_LOOKUP_TIMEOUT_MS;
    let harness = Harness::new(policy, Arc::new(RecordingSink::new())).await?;
    let monitor = &harness.monitor;
    let t0 = Utc::now();

    // ── Step 1 ───────────────────────────────────────────────────────────────

    monitor
        .add_medication(prescription("Warfarin", 5.0, "mg", 24.0, Some(40.0), 30.0), None, t0)
        .await?;
    let healthy = monitor
        .add_medication(prescription("Lisinopril", 10.0, "mg", 24.0, Some(12.0), 30.0), None, t0)
        .await?;
    println!("  [1] Warfarin + Lisinopril added: {}", describe_status(healthy.check_status));

    // ── Step 2 ───────────────────────────────────────────────────────────────

    harness.lookup.set_outage(true);
    println!("  [2] Interaction service DOWN");
    let ibuprofen = monitor
        .add_medication(prescription("Ibuprofen", 400.0, "mg", 8.0, Some(2.0), 20.0), None, t0)
        .await;
    let overlap_blocked = match ibuprofen {
        Err(PulseGuardError::BlockedByInteraction { findings, .. }) => {
            println!("      Add Ibuprofen: BLOCKED by the local overlap check");
            print_findings(&findings);
            true
        }
        Err(e) => return Err(e),
        Ok(outcome) => {
            println!("      Add Ibuprofen: allowed ({})", describe_status(outcome.check_status));
            false
        }
    };

    // ── Step 3 ───────────────────────────────────────────────────────────────

    let degraded = monitor
        .add_medication(prescription("Amoxicillin", 500.0, "mg", 8.0, Some(1.0), 21.0), None, t0)
        .await?;
    println!("  [3] Add Amoxicillin: {}", describe_status(degraded.check_status));
    for failure in &degraded.unavailable {
        println!("      - {} not checked: {}", failure.pair, failure.reason);
    }

    // ── Steps 4-6: background re-checks ──────────────────────────────────────

    let mut checks = Vec::new();
    let mut now = t0 + Duration::minutes(1);

    println!("  [4] Ticks while degraded:");
    for _ in 0..2 {
        let tick = monitor.tick(now).await;
        println!("      tick: interaction check {:?}, new alerts {}", tick.interaction_check, tick.alerts_created);
        checks.push(tick.interaction_check);
        now += Duration::minutes(1);
    }

    harness.lookup.restore();
    harness.lookup.stall_pair("Lisinopril", "Amoxicillin");
    println!("  [5] Service back, but lisinopril + amoxicillin stalls:");
    let tick = monitor.tick(now).await;
    println!("      tick: interaction check {:?}", tick.interaction_check);
    checks.push(tick.interaction_check);
    now += Duration::minutes(1);

    harness.lookup.restore();
    println!("  [6] Full recovery:");
    for _ in 0..2 {
        let tick = monitor.tick(now).await;
        println!("      tick: interaction check {:?}", tick.interaction_check);
        checks.push(tick.interaction_check);
        now += Duration::minutes(1);
    }

    print_feed(monitor);
    let incomplete_alerts = monitor
        .unread_alerts()
        .iter()
        .filter(|a| a.alert_type == AlertType::Interaction && a.title == "Interaction check incomplete")
        .count();
    println!();
    println!("  Lookup calls made: {}", harness.lookup.query_count());
    println!();
    println!("  Scenario 3 complete.");
    println!();

    Ok(DegradedLookupReport {
        overlap_blocked,
        degraded_add_status: degraded.check_status,
        checks,
        incomplete_alerts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outage_is_reported_and_retried_until_complete() {
        let report = run_scenario().await.unwrap();
        assert!(report.overlap_blocked);
        assert_eq!(report.degraded_add_status, CheckStatus::Incomplete);
        assert_eq!(
            report.checks,
            vec![
                Some(CheckStatus::Incomplete),
                Some(CheckStatus::Incomplete),
                Some(CheckStatus::Incomplete),
                Some(CheckStatus::Clear),
                None,
            ]
        );
        assert_eq!(report.incomplete_alerts, 1);
    }
}

//! Scenario 2: Reminder Deduplication
//!
//! Drives the scheduler tick by hand across a simulated day to show that each
//! trigger is emitted exactly once, that a logged dose re-arms the reminder,
//! and that missed doses and low stock land in the feed once.
//!
//! Walk-through for the demo run:
//!   1. Metformin is added and its first dose taken
//!   2. Ticks before, around and after the next due time emit one
//!      "due soon" and one "overdue" notification
//!   3. Logging the dose drops stock to the threshold: one low-stock alert
//!   4. The new due time re-arms the "due soon" reminder
//!   5. The following dose is never logged: one missed-dose alert
//!   6. The feed poll delivers each new alert to the sink once

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use pulseguard_contracts::{
    alert::{AlertType, NotificationKind, SafetyStatus},
    dose::DoseEventStatus,
    error::PulseGuardResult,
    medication::hours,
};
use pulseguard_monitor::PatientMonitor;

use super::{print_feed, reference_policy, Harness};
use crate::{mock_data::prescription, sinks::RecordingSink};

#[derive(Debug, Clone, PartialEq)]
pub struct ReminderDedupReport {
    pub due_soon: usize,
    pub overdue: usize,
    pub missed_alerts: usize,
    pub low_stock_alerts: usize,
    pub delivered_from_feed: usize,
    pub compliance_percent: u32,
    pub status: SafetyStatus,
}

async fn tick_at(monitor: &PatientMonitor, label: &str, now: DateTime<Utc>) -> usize {
    let report = monitor.tick(now).await;
    println!(
        "      tick {:<16} notifications {}  new alerts {}  missed {}",
        label, report.notifications_sent, report.alerts_created, report.missed_doses
    );
    report.notifications_sent
}

/// Run Scenario 2: Reminder Deduplication.
pub async fn run_scenario() -> PulseGuardResult<ReminderDedupReport> {
    println!("=== Scenario 2: Reminder Deduplication ===");
    println!();

    let sink = Arc::new(RecordingSink::echoing());
    let harness = Harness::new(reference_policy()?, sink.clone()).await?;
    let monitor = &harness.monitor;
    let t0 = Utc::now();
    let minutes = Duration::minutes;

    // ── Step 1 ───────────────────────────────────────────────────────────────

    let med = monitor
        .add_medication(prescription("Metformin", 1.0, "tablet", 12.0, Some(6.0), 7.0), None, t0)
        .await?
        .medication;
    monitor.log_dose(med.id, DoseEventStatus::Taken, t0, None).await?;
    let first_due = t0 + hours(12.0);
    println!("  [1] Metformin 1 tablet every 12h; first dose taken, next due in 12h");

    // ── Step 2 ───────────────────────────────────────────────────────────────

    println!("  [2] Ticks around the next due time:");
    tick_at(monitor, "due -10m", first_due - minutes(10)).await;
    tick_at(monitor, "due -4m", first_due - minutes(4)).await;
    tick_at(monitor, "due -3m", first_due - minutes(3)).await;
    tick_at(monitor, "due +2m", first_due + minutes(2)).await;
    tick_at(monitor, "due +3m", first_due + minutes(3)).await;

    // ── Step 3 ───────────────────────────────────────────────────────────────

    let logged_at = first_due + minutes(5);
    let logged = monitor.log_dose(med.id, DoseEventStatus::Taken, logged_at, None).await?;
    println!(
        "  [3] Dose logged 5 min late: stock {} -> {} (threshold {})",
        logged.dose.stock_before, logged.dose.stock_after, med.stock_threshold
    );
    tick_at(monitor, "log +1m", logged_at + minutes(1)).await;

    // ── Step 4 ───────────────────────────────────────────────────────────────

    let second_due = logged.dose.next_pending.scheduled_time;
    println!("  [4] New due time re-arms the reminder:");
    tick_at(monitor, "due2 -4m", second_due - minutes(4)).await;

    // ── Step 5 ───────────────────────────────────────────────────────────────

    println!("  [5] Dose never logged:");
    tick_at(monitor, "due2 +61m", second_due + minutes(61)).await;
    tick_at(monitor, "due2 +62m", second_due + minutes(62)).await;

    // ── Step 6 ───────────────────────────────────────────────────────────────

    println!("  [6] Feed poll:");
    let delivered = monitor.poll_feed().await;
    let again = monitor.poll_feed().await;
    println!("      delivered {delivered} alert(s), then {again} on the next poll");
    print_feed(monitor);

    let alerts = monitor.unread_alerts();
    let count = |t: AlertType| alerts.iter().filter(|a| a.alert_type == t).count();
    let summary = monitor.safety_summary();
    println!();
    println!(
        "  Safety status: {:?}, compliance {}%",
        summary.status, summary.compliance_percent
    );
    println!();
    println!("  Scenario 2 complete.");
    println!();

    Ok(ReminderDedupReport {
        due_soon: sink.count_of(NotificationKind::DoseApproaching),
        overdue: sink.count_of(NotificationKind::DoseOverdue),
        missed_alerts: count(AlertType::MissedDose),
        low_stock_alerts: count(AlertType::LowStock),
        delivered_from_feed: delivered,
        compliance_percent: summary.compliance_percent,
        status: summary.status,
    })
}

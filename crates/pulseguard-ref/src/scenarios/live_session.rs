//! Live monitoring session on the wall clock.
//!
//! Starts a real `MonitoringSession` with one-second cadences, lets it run
//! for the requested time while notifications print to the console, then
//! ends it and prints the safety summary as JSON.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use pulseguard_contracts::error::{PulseGuardError, PulseGuardResult};
use pulseguard_monitor::{MonitoringSession, SafetySummary};

use super::{print_feed, reference_policy, Harness};
use crate::{mock_data::prescription, sinks::ConsoleSink};

/// Run a session for `seconds` and return the final safety summary.
pub async fn run_session(seconds: u64) -> PulseGuardResult<SafetySummary> {
    println!("=== Live Monitoring Session ({seconds}s) ===");
    println!();

    let mut policy = reference_policy()?;
    policy.reminders.dose_tick_seconds = 1;
    policy.reminders.feed_poll_seconds = 1;
    let harness = Harness::new(policy, Arc::new(ConsoleSink)).await?;
    let monitor = &harness.monitor;
    let now = Utc::now();

    monitor
        .add_medication(prescription("Metformin", 500.0, "mg", 12.0, Some(6.0), 4.0), None, now)
        .await?;
    monitor
        .add_medication(prescription("Lisinopril", 10.0, "mg", 24.0, Some(12.0), 30.0), None, now)
        .await?;
    monitor
        .add_medication(prescription("Potassium", 20.0, "mEq", 24.0, None, 30.0), None, now)
        .await?;
    println!("  Tracking Metformin, Lisinopril and Potassium. Session running...");
    println!();

    let session = MonitoringSession::start(Arc::clone(monitor));
    tokio::time::sleep(Duration::from_secs(seconds)).await;
    session.end().await;

    println!();
    print_feed(monitor);
    let summary = monitor.safety_summary();
    let rendered = serde_json::to_string_pretty(&summary).map_err(|e| PulseGuardError::ConfigError {
        reason: format!("could not render safety summary: {e}"),
    })?;
    println!();
    println!("  Safety summary:");
    for line in rendered.lines() {
        println!("    {line}");
    }
    println!();
    Ok(summary)
}

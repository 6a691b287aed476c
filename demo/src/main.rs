//! PulseGuard Reference Runtime: Demo CLI
//!
//! Runs one or all of the medication safety scenarios, or a short live
//! monitoring session. Each scenario uses the real PulseGuard components
//! wired to in-memory collaborators and mock drug data.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- interaction-block
//!   cargo run -p demo -- reminder-dedup
//!   cargo run -p demo -- degraded-lookup
//!   cargo run -p demo -- monitor --seconds 5

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pulseguard_contracts::error::PulseGuardResult;
use pulseguard_ref::scenarios::{degraded_lookup, interaction_block, live_session, reminder_dedup};

// ── CLI definition ────────────────────────────────────────────────────────────

/// PulseGuard: medication safety monitoring demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "PulseGuard medication safety reference runtime demo",
    long_about = "Runs PulseGuard scenarios showing interaction gating, reminder\n\
                  deduplication, degraded lookups and a live monitoring session."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the three scenarios in sequence.
    RunAll,
    /// Scenario 1: Critical Interaction Block (acknowledged overrides).
    InteractionBlock,
    /// Scenario 2: Reminder Deduplication (one notification per trigger).
    ReminderDedup,
    /// Scenario 3: Degraded Interaction Lookup (incomplete, never "safe").
    DegradedLookup,
    /// Run a live monitoring session on the wall clock.
    Monitor {
        /// How long to keep the session running.
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all().await,
        Command::InteractionBlock => interaction_block::run_scenario().await.map(|r| debug!(?r, "scenario 1")),
        Command::ReminderDedup => reminder_dedup::run_scenario().await.map(|r| debug!(?r, "scenario 2")),
        Command::DegradedLookup => degraded_lookup::run_scenario().await.map(|r| debug!(?r, "scenario 3")),
        Command::Monitor { seconds } => live_session::run_session(seconds).await.map(|_| ()),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

async fn run_all() -> PulseGuardResult<()> {
    interaction_block::run_scenario().await?;
    reminder_dedup::run_scenario().await?;
    degraded_lookup::run_scenario().await?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("PulseGuard: Medication Safety Monitoring");
    println!("Reference Demo");
    println!("=========================================");
    println!();
    println!("Safety guarantees exercised:");
    println!("  [1] Critical interactions block adds and 'taken' logs until acknowledged");
    println!("  [2] Acknowledgments are bound to what was shown; overrides are hash-chained");
    println!("  [3] Each reminder fires once per (medication, due time, kind)");
    println!("  [4] A failed or timed-out lookup is 'incomplete', never 'no issues'");
    println!("  [5] Dose logs are atomic against the background scheduler tick");
    println!();
}

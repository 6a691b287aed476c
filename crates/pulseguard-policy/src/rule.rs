//! Safety policy schema.
//!
//! A `SafetyPolicy` is deserialized from TOML. Every field carries a serde
//! default, so an empty document yields `SafetyPolicy::default()`, the
//! recommended policy.
//!
//! Example:
//! ```toml
//! [schedule]
//! missed_dose_threshold_minutes = 60
//!
//! [reminders]
//! dose_tick_seconds = 60
//! feed_poll_seconds = 30
//!
//! [classification]
//! critical_combos = [["warfarin", "aspirin"]]
//! ```

use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use pulseguard_contracts::{
    error::{PulseGuardError, PulseGuardResult},
    medication::MAX_SCHEDULE_HOURS,
};
use pulseguard_core::intake::IntakeDefaults;

/// Upper bound for every minute-valued schedule threshold: one year.
pub const MAX_WINDOW_MINUTES: i64 = 60 * 24 * 365;

/// Upper bound for the tick and feed-poll cadences: one day.
pub const MAX_CADENCE_SECONDS: u64 = 60 * 60 * 24;

/// Upper bound for any call timeout: ten minutes.
pub const MAX_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// Upper bound for the ledger and feed sizes.
pub const MAX_CAPACITY: usize = 1 << 20;

/// The top-level structure deserialized from a TOML policy file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyPolicy {
    pub schedule: SchedulePolicy,
    pub reminders: ReminderPolicy,
    pub lookup: LookupPolicy,
    pub classification: ClassificationPolicy,
}

/// Dose timing thresholds and intake defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulePolicy {
    /// A pending dose this far past due is reclassified as missed.
    pub missed_dose_threshold_minutes: i64,
    /// A dose due within this window is "approaching".
    pub approaching_window_minutes: i64,
    /// Beyond this many minutes overdue a reminder is stale and suppressed.
    /// Also the grace window after which ledger entries are released.
    pub stale_after_minutes: i64,
    pub default_half_life_hours: f64,
    pub min_frequency_hours: f64,
    pub default_stock_threshold: f64,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            missed_dose_threshold_minutes: 60,
            approaching_window_minutes: 5,
            stale_after_minutes: 60,
            default_half_life_hours: 6.0,
            min_frequency_hours: 0.5,
            default_stock_threshold: 5.0,
        }
    }
}

/// Background session cadences and feed bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderPolicy {
    pub dose_tick_seconds: u64,
    pub feed_poll_seconds: u64,
    /// Maximum number of live reminder ledger entries.
    pub ledger_capacity: usize,
    /// Maximum number of unread alerts returned by one feed read.
    pub feed_limit: usize,
    pub delivery_timeout_ms: u64,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            dose_tick_seconds: 60,
            feed_poll_seconds: 30,
            ledger_capacity: 4096,
            feed_limit: 50,
            delivery_timeout_ms: 2000,
        }
    }
}

/// Bounds on external calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupPolicy {
    /// Interaction lookups in flight at once, per check.
    pub max_concurrency: usize,
    /// Per-call timeout for interaction and drug info lookups.
    pub timeout_ms: u64,
    pub store_timeout_ms: u64,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self { max_concurrency: 4, timeout_ms: 5000, store_timeout_ms: 5000 }
    }
}

/// Severity classification rules for raw interaction results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationPolicy {
    /// Source labels that are critical outright.
    pub critical_labels: Vec<String>,
    /// Source labels that are informational.
    pub info_labels: Vec<String>,
    /// Fragments that make a finding critical when found in its label or
    /// description.
    pub critical_keywords: Vec<String>,
    /// Drug name fragment pairs that are critical in either order.
    pub critical_combos: Vec<[String; 2]>,
    /// A dose stays active for this many half-lives.
    pub clearance_half_lives: f64,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        let combos = [
            ("warfarin", "aspirin"),
            ("warfarin", "ibuprofen"),
            ("warfarin", "naproxen"),
            ("warfarin", "diclofenac"),
            ("warfarin", "ketorolac"),
            ("metformin", "alcohol"),
            ("maois", "tyramine"),
            ("ssri", "maois"),
            ("methotrexate", "nsaid"),
            ("lithium", "nsaid"),
            ("lithium", "ace inhibitor"),
            ("lithium", "thiazide"),
            ("cisapride", "antifungal"),
            ("terfenadine", "ketoconazole"),
            ("cisapride", "macrolide"),
            ("thioridazine", "antipsychotic"),
            ("mefloquine", "quinine"),
            ("haloperidol", "antiarrhythmic"),
        ];
        Self {
            critical_labels: strings(&["high", "critical", "fatal", "contraindicated"]),
            info_labels: strings(&["low", "minor", "info"]),
            critical_keywords: strings(&[
                "contraindicated",
                "serious",
                "severe",
                "fatal",
                "life-threatening",
                "do not use",
                "avoid",
                "dangerous",
                "hemorrhage",
                "bleeding",
                "cardiac arrest",
                "arrhythmia",
                "torsade",
                "serotonin syndrome",
                "hypertensive crisis",
                "respiratory depression",
            ]),
            critical_combos: combos
                .iter()
                .map(|(a, b)| [a.to_string(), b.to_string()])
                .collect(),
            clearance_half_lives: 5.0,
        }
    }
}

impl SafetyPolicy {
    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `PulseGuardError::ConfigError` if the TOML is malformed, does
    /// not match the schema, or holds an out-of-range value.
    pub fn from_toml_str(s: &str) -> PulseGuardResult<Self> {
        let policy: SafetyPolicy = toml::from_str(s).map_err(|e| PulseGuardError::ConfigError {
            reason: format!("failed to parse safety policy TOML: {}", e),
        })?;
        policy.validate()?;
        Ok(policy)
    }

    /// Read the file at `path` and parse it as a safety policy.
    pub fn from_file(path: &Path) -> PulseGuardResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| PulseGuardError::ConfigError {
            reason: format!("failed to read policy file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reject values that would stall the session or disable a safeguard.
    pub fn validate(&self) -> PulseGuardResult<()> {
        let fail = |reason: &str| Err(PulseGuardError::ConfigError { reason: reason.to_string() });

        let s = &self.schedule;
        if s.missed_dose_threshold_minutes <= 0 {
            return fail("schedule.missed_dose_threshold_minutes must be positive");
        }
        if s.approaching_window_minutes < 0 {
            return fail("schedule.approaching_window_minutes must not be negative");
        }
        if s.stale_after_minutes <= 0 {
            return fail("schedule.stale_after_minutes must be positive");
        }
        if [s.missed_dose_threshold_minutes, s.approaching_window_minutes, s.stale_after_minutes]
            .iter()
            .any(|m| *m > MAX_WINDOW_MINUTES)
        {
            return fail("schedule thresholds must be at most one year");
        }
        if !(s.default_half_life_hours.is_finite()
            && s.default_half_life_hours > 0.0
            && s.default_half_life_hours <= MAX_SCHEDULE_HOURS)
        {
            return fail("schedule.default_half_life_hours must be positive and at most one year");
        }
        if !(s.min_frequency_hours.is_finite()
            && s.min_frequency_hours >= 0.001
            && s.min_frequency_hours <= MAX_SCHEDULE_HOURS)
        {
            return fail("schedule.min_frequency_hours must be between 0.001 and one year");
        }
        if !(s.default_stock_threshold.is_finite() && s.default_stock_threshold > 0.0) {
            return fail("schedule.default_stock_threshold must be positive");
        }

        let r = &self.reminders;
        if r.dose_tick_seconds == 0 || r.feed_poll_seconds == 0 {
            return fail("reminder cadences must be at least one second");
        }
        if r.dose_tick_seconds > MAX_CADENCE_SECONDS || r.feed_poll_seconds > MAX_CADENCE_SECONDS {
            return fail("reminder cadences must be at most one day");
        }
        if r.ledger_capacity == 0 || r.feed_limit == 0 {
            return fail("reminders.ledger_capacity and reminders.feed_limit must be positive");
        }
        if r.ledger_capacity > MAX_CAPACITY || r.feed_limit > MAX_CAPACITY {
            return fail("reminders.ledger_capacity and reminders.feed_limit are too large");
        }
        if r.delivery_timeout_ms == 0 || r.delivery_timeout_ms > MAX_TIMEOUT_MS {
            return fail("reminders.delivery_timeout_ms must be between 1 and 600000");
        }

        let l = &self.lookup;
        if l.max_concurrency == 0 {
            return fail("lookup.max_concurrency must be positive");
        }
        if l.max_concurrency > MAX_CAPACITY {
            return fail("lookup.max_concurrency is too large");
        }
        if l.timeout_ms == 0 || l.store_timeout_ms == 0 {
            return fail("lookup timeouts must be positive");
        }
        if l.timeout_ms > MAX_TIMEOUT_MS || l.store_timeout_ms > MAX_TIMEOUT_MS {
            return fail("lookup timeouts must be at most 600000 ms");
        }

        let c = self.classification.clearance_half_lives;
        if !(c.is_finite() && c > 0.0 && c <= 100.0) {
            return fail("classification.clearance_half_lives must be in (0, 100]");
        }
        Ok(())
    }

    pub fn intake_defaults(&self) -> IntakeDefaults {
        IntakeDefaults {
            default_half_life_hours: self.schedule.default_half_life_hours,
            min_frequency_hours: self.schedule.min_frequency_hours,
            default_stock_threshold: self.schedule.default_stock_threshold,
        }
    }

    pub fn missed_dose_threshold(&self) -> Duration {
        Duration::minutes(self.schedule.missed_dose_threshold_minutes)
    }

    pub fn approaching_window(&self) -> Duration {
        Duration::minutes(self.schedule.approaching_window_minutes)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::minutes(self.schedule.stale_after_minutes)
    }

    pub fn dose_tick(&self) -> StdDuration {
        StdDuration::from_secs(self.reminders.dose_tick_seconds)
    }

    pub fn feed_poll(&self) -> StdDuration {
        StdDuration::from_secs(self.reminders.feed_poll_seconds)
    }

    pub fn delivery_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.reminders.delivery_timeout_ms)
    }

    pub fn lookup_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.lookup.timeout_ms)
    }

    pub fn store_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.lookup.store_timeout_ms)
    }
}

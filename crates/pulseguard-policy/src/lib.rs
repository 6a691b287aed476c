//! # pulseguard-policy
//!
//! TOML-driven safety policy for the PulseGuard monitoring core.
//!
//! ## Overview
//!
//! This crate provides [`SafetyPolicy`], the single configuration document
//! for schedule thresholds, session cadences, lookup bounds and severity
//! classification, and [`SeverityClassifier`], which maps raw interaction
//! lookup results onto the `info` / `warning` / `critical` tiers.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use pulseguard_policy::{SafetyPolicy, SeverityClassifier};
//!
//! let policy = SafetyPolicy::from_file(Path::new("policies/safety.toml"))?;
//! let classifier = SeverityClassifier::new(&policy.classification);
//! ```

pub mod engine;
pub mod rule;

pub use engine::SeverityClassifier;
pub use rule::{ClassificationPolicy, LookupPolicy, ReminderPolicy, SafetyPolicy, SchedulePolicy};

// ── Tests ─────────────────────────────────────────────────────────────────────

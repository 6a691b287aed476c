//! # pulseguard-core
//!
//! The deterministic heart of the PulseGuard monitoring core.
//!
//! This crate provides:
//! - The collaborator traits (`MedicationStore`, `InteractionLookup`,
//!   `DrugInfoService`, `NotificationSink`, `OverrideWriter`)
//! - The concentration decay model
//! - Medication intake with boundary defaults
//! - The `DoseScheduler` that owns pending dose events and dose logging
//!
//! Nothing here performs I/O or reads the clock: every operation takes `now`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pulseguard_core::{schedule::DoseScheduler, traits::MedicationStore};
//! ```

pub mod concentration;
pub mod intake;
pub mod schedule;
pub mod traits;

pub use schedule::DoseScheduler;

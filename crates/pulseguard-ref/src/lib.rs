//! # pulseguard-ref
//!
//! Reference runtime for the PulseGuard medication safety core.
//!
//! Provides in-memory stand-ins for every external collaborator and three
//! walk-through scenarios built on them:
//!
//! 1. **Critical Interaction Block**: the safety gate refusing an add and a
//!    dose log until a fingerprint-bound override is recorded.
//! 2. **Reminder Deduplication**: one notification per trigger across a
//!    simulated day, with missed-dose and low-stock alerts.
//! 3. **Degraded Interaction Lookup**: outages and timeouts reported as
//!    incomplete checks and retried, never shown as "no issues".
//!
//! A live session on the wall clock is also available. All data is
//! hardcoded and fictional. No external API calls are made.

pub mod mock_data;
pub mod scenarios;
pub mod sinks;
pub mod store;

pub use mock_data::{MockDrugInfo, MockInteractionLookup};
pub use sinks::{ConsoleSink, RecordingSink};
pub use store::InMemoryMedicationStore;

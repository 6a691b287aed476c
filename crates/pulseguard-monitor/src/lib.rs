//! # pulseguard-monitor
//!
//! Everything that runs over time for one patient.
//!
//! - [`ReminderScheduler`]: dose reminder phases and dedup of every
//!   notification and alert through the [`ledger`]
//! - [`AlertAggregator`]: the unified feed, compliance and safety status
//! - [`PatientMonitor`]: owns the state above plus the dose schedules, and
//!   exposes the patient-facing operations
//! - [`MonitoringSession`]: the background task driving ticks and feed polls

pub mod aggregator;
pub mod ledger;
pub mod monitor;
pub mod reminder;
pub mod session;

pub use aggregator::{AlertAggregator, SafetySummary};
pub use monitor::{AddOutcome, Collaborators, DoseLogOutcome, PatientMonitor, TickReport};
pub use reminder::ReminderScheduler;
pub use session::{MonitoringSession, SessionHandle};

//! # pulseguard-interactions
//!
//! Interaction risk across a patient's active medication set.
//!
//! - [`InteractionMatrix`]: bounded, timed fan-out of one lookup per drug
//!   pair, merged into deduplicated, severity-classified findings
//! - [`overlap`]: the local pharmacokinetic overlap check
//! - [`fingerprint`]: binds acknowledgments to what the caller was shown
//! - [`SafetyGate`]: refuses guarded actions on critical findings unless a
//!   matching acknowledgment is supplied and recorded

pub mod fingerprint;
pub mod gate;
pub mod matrix;
pub mod overlap;

pub use gate::SafetyGate;
pub use matrix::{CandidateCheck, CandidateDrug, InteractionMatrix, InteractionReport};

//! # pulseguard-contracts
//!
//! Shared types and the error taxonomy for the PulseGuard medication safety
//! core.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate: only data definitions, small derivations and error types.

pub mod acknowledgment;
pub mod alert;
pub mod dose;
pub mod error;
pub mod interaction;
pub mod medication;

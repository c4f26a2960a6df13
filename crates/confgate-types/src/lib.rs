//! Shared types, the provider contract, and errors for confgate.
//!
//! This crate holds what both the gateway and the provider implementations
//! need, so adapter crates do not depend on the gateway itself.

pub mod error;
pub mod prelude;
pub mod provider;
pub mod types;

// vim: ts=4

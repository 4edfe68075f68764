//! Core domain types
//!
//! This module contains the domain structures used across Shipyard crates.
//! Static configuration (targets, phases, deploy policy) is loaded once per
//! run; runtime records (results, artifacts, decisions) are immutable once built.

pub mod artifact;
pub mod deploy;
pub mod log;
pub mod phase;
pub mod pipeline;
pub mod result;
pub mod target;
pub mod trigger;

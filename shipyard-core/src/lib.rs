//! Shipyard Core
//!
//! Core types and abstractions for the Shipyard build orchestrator.
//!
//! This crate contains:
//! - Domain types: targets, phases, phase results, artifacts, deployment decisions
//! - Error taxonomy shared by the parser, runner and CLI

pub mod domain;
pub mod error;

pub use error::{CollectionError, ConfigError, ExecError};

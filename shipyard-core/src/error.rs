//! Error types shared across Shipyard crates
//!
//! Command failures and timeouts are not errors at this level: they are
//! recorded as [`crate::domain::result::FailureReason`] on a phase result and
//! handled by the orchestrator's failure policy.

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::phase::PhaseKind;

/// Invalid static configuration, detected before any phase runs
///
/// Always fatal: a run never starts with a configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The target set has no members
    #[error("target set is empty")]
    EmptyTargetSet,

    /// Two targets share an identifier
    #[error("duplicate target id: {0}")]
    DuplicateTarget(String),

    /// A target identifier is empty or whitespace
    #[error("target id cannot be blank")]
    BlankTargetId,

    /// The pipeline declares no phases
    #[error("pipeline declares no phases")]
    NoPhases,

    /// A phase definition is unusable
    #[error("malformed phase '{phase}': {reason}")]
    MalformedPhase { phase: PhaseKind, reason: String },

    /// Phases are declared out of order or more than once
    #[error("phase '{phase}' is declared after '{previous}'; phases must follow checkout, dependencies, test, deploy and appear once")]
    PhaseOrder { phase: PhaseKind, previous: PhaseKind },

    /// A deployment allow-list pattern does not compile
    #[error("invalid deploy pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The definition file could not be understood
    #[error("invalid pipeline definition: {0}")]
    Definition(String),

    /// A runner setting is out of range
    #[error("invalid runner setting: {0}")]
    InvalidSetting(String),
}

/// Artifact collection failed
///
/// Never aborts a run; the run is reported as degraded instead.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// Filesystem operation failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The relative path is absolute or escapes the target directory
    #[error("invalid artifact path: {0}")]
    InvalidPath(PathBuf),

    /// The source exists but is not a regular file
    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),
}

impl CollectionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// The external command could not be executed at all
#[derive(Debug, Error)]
pub enum ExecError {
    /// The rendered command line is empty
    #[error("empty command")]
    EmptyCommand,

    /// The process could not be spawned
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the process output or waiting on it failed
    #[error("I/O error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

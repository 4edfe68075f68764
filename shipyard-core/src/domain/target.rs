//! Target domain types
//!
//! A target is one build/test/deploy destination, typically a Linux
//! distribution variant. Targets are created from static configuration at
//! pipeline start and discarded when the run ends.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::phase::PhaseKind;
use crate::error::ConfigError;

/// Static target configuration, as written in a pipeline definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub id: String,
    #[serde(flatten)]
    pub flags: TargetFlags,
}

impl TargetSpec {
    /// Creates a target spec with default flags
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            flags: TargetFlags::default(),
        }
    }

    /// Marks the target as not running the test phase
    pub fn skip_tests(mut self) -> Self {
        self.flags.runs_tests = false;
        self
    }
}

/// Per-target capability flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFlags {
    #[serde(default = "default_runs_tests")]
    pub runs_tests: bool,
}

fn default_runs_tests() -> bool {
    true
}

impl Default for TargetFlags {
    fn default() -> Self {
        Self { runs_tests: true }
    }
}

/// Runtime status of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetStatus::Pending => write!(f, "Pending"),
            TargetStatus::Running => write!(f, "Running"),
            TargetStatus::Succeeded => write!(f, "Succeeded"),
            TargetStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// A target participating in a run
///
/// The status is only written by the phase runner executing the target's
/// current phase.
#[derive(Debug)]
pub struct Target {
    id: String,
    flags: TargetFlags,
    status: Mutex<TargetStatus>,
}

impl Target {
    pub fn new(spec: TargetSpec) -> Self {
        Self {
            id: spec.id,
            flags: spec.flags,
            status: Mutex::new(TargetStatus::Pending),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn flags(&self) -> &TargetFlags {
        &self.flags
    }

    pub fn status(&self) -> TargetStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_status(&self, status: TargetStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Whether this target takes part in the given phase
    ///
    /// Targets flagged with `runs_tests = false` sit out the test phase and
    /// receive a skipped result instead.
    pub fn participates_in(&self, phase: PhaseKind) -> bool {
        match phase {
            PhaseKind::Test => self.flags.runs_tests,
            _ => true,
        }
    }
}

/// The ordered, immutable set of targets of a run
#[derive(Debug, Clone)]
pub struct TargetSet {
    targets: Vec<Arc<Target>>,
}

impl TargetSet {
    /// Builds the target set from static configuration
    ///
    /// # Errors
    /// Fails if the list is empty, if an id is blank, or if two targets
    /// share an id.
    pub fn new(specs: Vec<TargetSpec>) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::EmptyTargetSet);
        }

        let mut seen = HashSet::new();
        for spec in &specs {
            if spec.id.trim().is_empty() {
                return Err(ConfigError::BlankTargetId);
            }
            if !seen.insert(spec.id.as_str()) {
                return Err(ConfigError::DuplicateTarget(spec.id.clone()));
            }
        }

        Ok(Self {
            targets: specs.into_iter().map(|s| Arc::new(Target::new(s))).collect(),
        })
    }

    /// Targets in declaration order
    pub fn targets(&self) -> &[Arc<Target>] {
        &self.targets
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Target>> {
        self.targets.iter().find(|t| t.id() == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

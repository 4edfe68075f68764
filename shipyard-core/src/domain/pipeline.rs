//! Pipeline domain types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::deploy::DeployPolicy;
use crate::domain::phase::{Phase, PhaseKind, validate_phases};
use crate::domain::target::{TargetSet, TargetSpec};
use crate::error::ConfigError;

/// Static pipeline definition
///
/// Loaded once at startup from a Lua or JSON definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub targets: Vec<TargetSpec>,
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub deploy: DeployPolicy,
    /// Upper bound on concurrently running targets; unbounded when absent
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    /// Environment variables passed to every phase command
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl PipelineDefinition {
    /// Validates the definition and builds its target set
    ///
    /// Deploy patterns are compiled by the deployment gate, not here.
    pub fn validate(&self) -> Result<TargetSet, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Definition(
                "pipeline name cannot be empty".to_string(),
            ));
        }

        if self.max_concurrency == Some(0) {
            return Err(ConfigError::Definition(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }

        validate_phases(&self.phases)?;
        TargetSet::new(self.targets.clone())
    }

    pub fn phase(&self, kind: PhaseKind) -> Option<&Phase> {
        self.phases.iter().find(|p| p.kind == kind)
    }
}

/// Orchestrator state
///
/// Advances `Pending -> Checkout -> Dependencies -> Test -> Deploy -> Done`;
/// phases absent from the definition are passed over. `Aborted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Pending,
    Checkout,
    Dependencies,
    Test,
    Deploy,
    Done,
    Aborted,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Aborted)
    }
}

impl From<PhaseKind> for PipelineState {
    fn from(kind: PhaseKind) -> Self {
        match kind {
            PhaseKind::Checkout => PipelineState::Checkout,
            PhaseKind::Dependencies => PipelineState::Dependencies,
            PhaseKind::Test => PipelineState::Test,
            PhaseKind::Deploy => PipelineState::Deploy,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Pending => write!(f, "Pending"),
            PipelineState::Checkout => write!(f, "Checkout"),
            PipelineState::Dependencies => write!(f, "Dependencies"),
            PipelineState::Test => write!(f, "Test"),
            PipelineState::Deploy => write!(f, "Deploy"),
            PipelineState::Done => write!(f, "Done"),
            PipelineState::Aborted => write!(f, "Aborted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITION: &str = r#"{
        "name": "packages",
        "targets": [
            {"id": "wheezy"},
            {"id": "jessie"},
            {"id": "el7", "runs_tests": false}
        ],
        "phases": [
            {"name": "checkout", "command": ["git", "checkout", "{commit}"], "parallel": false},
            {"name": "dependencies", "command": ["./ci/deps.sh", "{target}"]},
            {"name": "test", "command": ["./ci/test.sh", "{target}"], "artifacts": "out/{target}"},
            {"name": "deploy", "command": ["./ci/deploy.sh", "{target}"], "retries": 1}
        ]
    }"#;

    #[test]
    fn test_definition_from_json() {
        let definition: PipelineDefinition = serde_json::from_str(DEFINITION).unwrap();
        let targets = definition.validate().unwrap();

        assert_eq!(targets.ids(), vec!["wheezy", "jessie", "el7"]);
        assert_eq!(definition.phases.len(), 4);
        assert_eq!(definition.deploy, DeployPolicy::default());
        assert!(!definition.phase(PhaseKind::Checkout).unwrap().parallel);
        assert_eq!(definition.phase(PhaseKind::Deploy).unwrap().retries, 1);
        assert!(definition.max_concurrency.is_none());
    }

    #[test]
    fn test_definition_rejects_zero_concurrency() {
        let mut definition: PipelineDefinition = serde_json::from_str(DEFINITION).unwrap();
        definition.max_concurrency = Some(0);
        assert!(matches!(
            definition.validate(),
            Err(ConfigError::Definition(_))
        ));
    }

    #[test]
    fn test_definition_rejects_duplicate_targets() {
        let mut definition: PipelineDefinition = serde_json::from_str(DEFINITION).unwrap();
        definition.targets.push(TargetSpec::new("jessie"));
        assert!(matches!(
            definition.validate(),
            Err(ConfigError::DuplicateTarget(_))
        ));
    }

    #[test]
    fn test_state_from_phase() {
        assert_eq!(PipelineState::from(PhaseKind::Test), PipelineState::Test);
        assert!(PipelineState::Aborted.is_terminal());
        assert!(!PipelineState::Deploy.is_terminal());
    }
}

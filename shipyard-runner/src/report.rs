//! Run report
//!
//! Everything a pipeline run produced, returned by the orchestrator once the
//! run reaches a terminal state.

use serde::Serialize;
use shipyard_core::domain::artifact::Artifact;
use shipyard_core::domain::deploy::DeploymentDecision;
use shipyard_core::domain::log::LogEntry;
use shipyard_core::domain::phase::PhaseKind;
use shipyard_core::domain::pipeline::PipelineState;
use shipyard_core::domain::result::PhaseResult;
use shipyard_core::domain::trigger::TriggerEvent;
use uuid::Uuid;

/// A state change of the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub from: PipelineState,
    pub to: PipelineState,
    pub at: chrono::DateTime<chrono::Utc>,
}

/// Overall verdict of a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Success,
    /// Done, but with collection failures or failed best-effort phases
    PartialSuccess,
    Failed,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Success => write!(f, "success"),
            RunOutcome::PartialSuccess => write!(f, "partial success"),
            RunOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Summary of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pipeline: String,
    pub trigger: TriggerEvent,
    pub state: PipelineState,
    pub transitions: Vec<StateTransition>,
    /// Final result per target and phase, in phase then target order
    pub results: Vec<PhaseResult>,
    pub artifacts: Vec<Artifact>,
    pub deployment: DeploymentDecision,
    /// Whether any deploy command was started
    pub deploy_ran: bool,
    pub warnings: Vec<String>,
    pub degraded: bool,
    pub logs: Vec<LogEntry>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl RunReport {
    pub fn outcome(&self) -> RunOutcome {
        match self.state {
            PipelineState::Done if self.degraded => RunOutcome::PartialSuccess,
            PipelineState::Done => RunOutcome::Success,
            _ => RunOutcome::Failed,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.state == PipelineState::Aborted
    }

    /// Results that neither succeeded nor were skipped
    pub fn non_success(&self) -> Vec<&PhaseResult> {
        self.results.iter().filter(|r| r.is_failure()).collect()
    }

    pub fn results_for(&self, phase: PhaseKind) -> Vec<&PhaseResult> {
        self.results.iter().filter(|r| r.phase == phase).collect()
    }

    /// Whether any target ran the given phase
    pub fn ran_phase(&self, phase: PhaseKind) -> bool {
        self.results.iter().any(|r| r.phase == phase)
    }

    pub fn duration(&self) -> std::time::Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

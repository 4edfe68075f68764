//! Phase result domain types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::phase::PhaseKind;

/// Why a target failed a phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The command exited unsuccessfully; `None` when killed by a signal
    CommandFailure { exit_code: Option<i32> },
    /// The command exceeded its timeout and was killed
    Timeout { after: Duration },
    /// The command could not be started
    Launch(String),
    /// The worker task executing the target died
    Panicked(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::CommandFailure {
                exit_code: Some(code),
            } => write!(f, "command exited with status {}", code),
            FailureReason::CommandFailure { exit_code: None } => {
                write!(f, "command terminated by signal")
            }
            FailureReason::Timeout { after } => {
                write!(f, "timed out after {}s", after.as_secs())
            }
            FailureReason::Launch(msg) => write!(f, "launch failed: {}", msg),
            FailureReason::Panicked(msg) => write!(f, "worker panicked: {}", msg),
        }
    }
}

/// Outcome of one target in one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseOutcome {
    Succeeded,
    /// The target does not take part in this phase
    Skipped,
    Failed(FailureReason),
}

impl std::fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseOutcome::Succeeded => write!(f, "Succeeded"),
            PhaseOutcome::Skipped => write!(f, "Skipped"),
            PhaseOutcome::Failed(FailureReason::Timeout { .. }) => write!(f, "Failed/Timeout"),
            PhaseOutcome::Failed(_) => write!(f, "Failed"),
        }
    }
}

/// Result of running one phase for one target
///
/// Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub target_id: String,
    pub phase: PhaseKind,
    pub outcome: PhaseOutcome,
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr, truncated to the configured tail
    pub output: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    /// 1 for the first attempt, incremented on each retry
    pub attempt: u32,
}

impl PhaseResult {
    pub fn skipped(target_id: impl Into<String>, phase: PhaseKind) -> Self {
        let now = chrono::Utc::now();
        Self {
            target_id: target_id.into(),
            phase,
            outcome: PhaseOutcome::Skipped,
            exit_code: None,
            output: String::new(),
            started_at: now,
            finished_at: now,
            attempt: 1,
        }
    }

    pub fn failed(
        target_id: impl Into<String>,
        phase: PhaseKind,
        reason: FailureReason,
        attempt: u32,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            target_id: target_id.into(),
            phase,
            outcome: PhaseOutcome::Failed(reason),
            exit_code: None,
            output: String::new(),
            started_at: now,
            finished_at: now,
            attempt,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == PhaseOutcome::Succeeded
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, PhaseOutcome::Failed(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.outcome,
            PhaseOutcome::Failed(FailureReason::Timeout { .. })
        )
    }

    /// Succeeded or skipped: does not hold the pipeline back
    pub fn is_acceptable(&self) -> bool {
        !self.is_failure()
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match &self.outcome {
            PhaseOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_is_acceptable() {
        let result = PhaseResult::skipped("el7", PhaseKind::Test);
        assert!(result.is_acceptable());
        assert!(!result.is_success());
        assert!(result.failure_reason().is_none());
    }

    #[test]
    fn test_timeout_result() {
        let result = PhaseResult::failed(
            "jessie",
            PhaseKind::Test,
            FailureReason::Timeout {
                after: Duration::from_secs(30),
            },
            1,
        );

        assert!(result.is_failure());
        assert!(result.is_timeout());
        assert!(!result.is_acceptable());
        assert_eq!(result.outcome.to_string(), "Failed/Timeout");
        assert_eq!(
            result.failure_reason().unwrap().to_string(),
            "timed out after 30s"
        );
    }

    #[test]
    fn test_failure_reason_display() {
        let reason = FailureReason::CommandFailure { exit_code: Some(2) };
        assert_eq!(reason.to_string(), "command exited with status 2");

        let reason = FailureReason::CommandFailure { exit_code: None };
        assert_eq!(reason.to_string(), "command terminated by signal");
    }
}

//! Phase runner
//!
//! Runs one phase for one target:
//! - Renders the phase command for the target
//! - Invokes it through the command executor under a timeout
//! - Captures combined output and records the target's status
//!
//! The runner never retries; the orchestrator owns retry policy.

use shipyard_core::domain::phase::{Phase, TemplateVars};
use shipyard_core::domain::result::{FailureReason, PhaseOutcome, PhaseResult};
use shipyard_core::domain::target::{Target, TargetStatus};
use shipyard_core::domain::trigger::TriggerEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::executor::{CommandExecutor, Invocation, OutputSink};

/// Runs a single phase for a single target
pub struct PhaseRunner {
    executor: Arc<dyn CommandExecutor>,
    config: RunnerConfig,
    trigger: TriggerEvent,
    /// Definition-level environment, applied after the runner's own
    env: HashMap<String, String>,
}

impl PhaseRunner {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        config: RunnerConfig,
        trigger: TriggerEvent,
    ) -> Self {
        Self {
            executor,
            config,
            trigger,
            env: HashMap::new(),
        }
    }

    /// Adds environment variables from the pipeline definition
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn trigger(&self) -> &TriggerEvent {
        &self.trigger
    }

    /// Template variables for a target
    pub fn vars<'a>(&'a self, target_id: &'a str) -> TemplateVars<'a> {
        TemplateVars {
            target: target_id,
            branch: &self.trigger.branch,
            commit: &self.trigger.commit_sha,
        }
    }

    /// Runs `phase` for `target`
    ///
    /// Always produces a result; launch errors and timeouts become failed
    /// results rather than errors.
    pub async fn run(&self, target: &Target, phase: &Phase, attempt: u32) -> PhaseResult {
        if !target.participates_in(phase.kind) {
            debug!("Target {} skips phase {}", target.id(), phase.kind);
            return PhaseResult::skipped(target.id(), phase.kind);
        }

        target.set_status(TargetStatus::Running);

        let invocation = self.invocation(target, phase);
        let timeout = phase.timeout().unwrap_or(self.config.default_timeout);
        let started_at = chrono::Utc::now();

        info!(
            "Running {} for {} (attempt {}): {}",
            phase.kind,
            target.id(),
            attempt,
            invocation.argv.join(" ")
        );

        let sink = OutputSink::new();
        let (outcome, exit_code) = match tokio::time::timeout(
            timeout,
            self.executor.execute(&invocation, &sink),
        )
        .await
        {
            Ok(Ok(out)) if out.success => (PhaseOutcome::Succeeded, out.exit_code),
            Ok(Ok(out)) => (
                PhaseOutcome::Failed(FailureReason::CommandFailure {
                    exit_code: out.exit_code,
                }),
                out.exit_code,
            ),
            Ok(Err(e)) => (PhaseOutcome::Failed(FailureReason::Launch(e.to_string())), None),
            // The executor future is dropped here, killing the child; the
            // sink keeps what it printed so far
            Err(_) => (PhaseOutcome::Failed(FailureReason::Timeout { after: timeout }), None),
        };

        let finished_at = chrono::Utc::now();

        match &outcome {
            PhaseOutcome::Failed(reason) => {
                warn!("{} failed for {}: {}", phase.kind, target.id(), reason);
                target.set_status(TargetStatus::Failed);
            }
            _ => {
                info!("{} succeeded for {}", phase.kind, target.id());
                target.set_status(TargetStatus::Succeeded);
            }
        }

        PhaseResult {
            target_id: target.id().to_string(),
            phase: phase.kind,
            outcome,
            exit_code,
            output: truncate_output(&sink.snapshot(), self.config.max_output_bytes),
            started_at,
            finished_at,
            attempt,
        }
    }

    /// Builds the rendered invocation with its explicit environment
    fn invocation(&self, target: &Target, phase: &Phase) -> Invocation {
        let vars = self.vars(target.id());

        let mut env = self.config.env.clone();
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env.insert("SHIPYARD_TARGET".to_string(), target.id().to_string());
        env.insert("SHIPYARD_PHASE".to_string(), phase.kind.to_string());
        env.insert("SHIPYARD_BRANCH".to_string(), self.trigger.branch.clone());
        env.insert("SHIPYARD_COMMIT".to_string(), self.trigger.commit_sha.clone());
        env.insert("SHIPYARD_IS_TAG".to_string(), self.trigger.is_tag.to_string());

        Invocation {
            argv: phase.command.render(&vars),
            workdir: self.config.workdir.clone(),
            env,
            inherit_env: self.config.inherit_env,
        }
    }
}

/// Keeps the last `max` bytes of output, lossily decoded
fn truncate_output(output: &[u8], max: usize) -> String {
    if output.len() <= max {
        return String::from_utf8_lossy(output).into_owned();
    }

    let dropped = output.len() - max;
    format!(
        "[... {} bytes truncated]\n{}",
        dropped,
        String::from_utf8_lossy(&output[dropped..])
    )
}

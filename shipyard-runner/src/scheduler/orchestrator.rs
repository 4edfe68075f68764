//! Pipeline orchestrator
//!
//! Drives a run through its phases in order. Each phase is dispatched to
//! every target and joined before anything else happens; the joined results
//! then decide whether the run continues, collects artifacts, or aborts.
//!
//! Deployment is decided once, before the first phase, from the trigger's
//! ref. A negative decision ends the run at `Done` without starting any
//! deploy command.

use shipyard_core::ConfigError;
use shipyard_core::domain::phase::{Phase, PhaseKind};
use shipyard_core::domain::pipeline::{PipelineDefinition, PipelineState};
use shipyard_core::domain::result::{PhaseOutcome, PhaseResult};
use shipyard_core::domain::target::{Target, TargetSet};
use shipyard_core::domain::trigger::TriggerEvent;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::context::RunContext;
use crate::executor::CommandExecutor;
use crate::report::{RunReport, StateTransition};
use crate::scheduler::dispatcher::ParallelDispatcher;
use crate::service::{ArtifactCollector, DeploymentGate, PhaseRunner, validate_relative};

/// Runs a validated pipeline definition for one trigger event
pub struct PipelineOrchestrator {
    definition: PipelineDefinition,
    targets: TargetSet,
    config: RunnerConfig,
    gate: DeploymentGate,
    context: Arc<RunContext>,
    dispatcher: ParallelDispatcher,
    collector: Arc<ArtifactCollector>,
}

/// Mutable bookkeeping of a run in progress
struct Progress {
    state: PipelineState,
    transitions: Vec<StateTransition>,
    results: Vec<PhaseResult>,
    warnings: Vec<String>,
    degraded: bool,
    deploy_ran: bool,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: PipelineState::Pending,
            transitions: Vec::new(),
            results: Vec::new(),
            warnings: Vec::new(),
            degraded: false,
            deploy_ran: false,
        }
    }

    fn transition(&mut self, to: PipelineState) {
        info!("Pipeline state {} -> {}", self.state, to);
        self.transitions.push(StateTransition {
            from: self.state,
            to,
            at: chrono::Utc::now(),
        });
        self.state = to;
    }
}

impl PipelineOrchestrator {
    /// Validates the definition and configuration and prepares a run
    ///
    /// # Errors
    /// Any configuration problem is reported here, before a phase starts.
    pub fn new(
        definition: PipelineDefinition,
        config: RunnerConfig,
        trigger: TriggerEvent,
        executor: Arc<dyn CommandExecutor>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let targets = definition.validate()?;
        let gate = DeploymentGate::from_policy(&definition.deploy)?;

        let context = RunContext::new(trigger.clone());
        let collector = Arc::new(ArtifactCollector::new(
            &config.artifact_dir,
            context.run_id,
        ));
        let runner = PhaseRunner::new(executor, config.clone(), trigger)
            .with_env(definition.env.clone());

        Ok(Self {
            definition,
            targets,
            config,
            gate,
            context,
            dispatcher: ParallelDispatcher::new(Arc::new(runner)),
            collector,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.context.run_id
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    /// Concurrency cap; the runner configuration overrides the definition
    fn max_concurrency(&self) -> Option<usize> {
        self.config.max_concurrency.or(self.definition.max_concurrency)
    }

    /// Runs every phase and returns the report once the run is terminal
    pub async fn run(self) -> RunReport {
        let started_at = chrono::Utc::now();
        let trigger = self.context.trigger.clone();
        let decision = self.gate.should_deploy(trigger.ref_name());

        info!(
            "Starting pipeline '{}' (run {}) for {} '{}' at {}",
            self.definition.name,
            self.context.run_id,
            trigger.ref_kind(),
            trigger.ref_name(),
            trigger.commit_sha
        );
        self.context.log_info(format!(
            "Targets: {}; deployment: {}",
            self.targets.ids().join(", "),
            decision.reason
        ));

        let mut progress = Progress::new();

        for phase in &self.definition.phases {
            if phase.kind == PhaseKind::Deploy && !decision.deploy {
                info!("Not deploying: {}", decision.reason);
                self.context
                    .log_info(format!("Deploy skipped: {}", decision.reason));
                break;
            }

            progress.transition(phase.kind.into());
            self.context.log_info(format!("Phase {} started", phase.kind));

            let results = self.run_phase(phase).await;

            if phase.kind == PhaseKind::Deploy {
                progress.deploy_ran = results
                    .iter()
                    .any(|r| r.outcome != PhaseOutcome::Skipped);
            }

            if let Some(dir) = &phase.artifacts {
                self.collect_artifacts(dir, &results, &mut progress).await;
            }

            let failed: Vec<&str> = results
                .iter()
                .filter(|r| r.is_failure())
                .map(|r| r.target_id.as_str())
                .collect();

            let abort = if failed.is_empty() {
                self.context
                    .log_info(format!("Phase {} succeeded", phase.kind));
                false
            } else if phase.best_effort {
                let message = format!(
                    "Best-effort phase {} failed for {}",
                    phase.kind,
                    failed.join(", ")
                );
                warn!("{}", message);
                self.context.log_warning(message.clone());
                progress.warnings.push(message);
                progress.degraded = true;
                false
            } else {
                let message = format!(
                    "Phase {} failed for {}; aborting",
                    phase.kind,
                    failed.join(", ")
                );
                error!("{}", message);
                self.context.log_error(message);
                true
            };

            progress.results.extend(results);

            if abort {
                progress.transition(PipelineState::Aborted);
                break;
            }
        }

        if !progress.state.is_terminal() {
            progress.transition(PipelineState::Done);
        }

        info!(
            "Pipeline '{}' finished: {}",
            self.definition.name, progress.state
        );

        RunReport {
            run_id: self.context.run_id,
            pipeline: self.definition.name.clone(),
            trigger,
            state: progress.state,
            transitions: progress.transitions,
            results: progress.results,
            artifacts: self.collector.artifacts(),
            deployment: decision,
            deploy_ran: progress.deploy_ran,
            warnings: progress.warnings,
            degraded: progress.degraded,
            logs: self.context.drain_logs(),
            started_at,
            finished_at: chrono::Utc::now(),
        }
    }

    /// Dispatches a phase, re-dispatching failed targets while retries remain
    ///
    /// A retried target's final attempt replaces its earlier result.
    async fn run_phase(&self, phase: &Phase) -> Vec<PhaseResult> {
        let targets = self.targets.targets();
        let max_concurrency = self.max_concurrency();

        let mut results = self
            .dispatcher
            .dispatch(targets, phase, max_concurrency)
            .await;

        let attempts = phase.retries.saturating_add(1);
        for attempt in 2..=attempts {
            let failed: Vec<usize> = results
                .iter()
                .enumerate()
                .filter(|(_, r)| r.is_failure())
                .map(|(i, _)| i)
                .collect();

            if failed.is_empty() {
                break;
            }

            let retry: Vec<Arc<Target>> =
                failed.iter().map(|&i| Arc::clone(&targets[i])).collect();

            let ids: Vec<&str> = retry.iter().map(|t| t.id()).collect();
            warn!(
                "Retrying {} for {} (attempt {} of {})",
                phase.kind,
                ids.join(", "),
                attempt,
                attempts
            );
            self.context.log_warning(format!(
                "Retrying {} for {} (attempt {})",
                phase.kind,
                ids.join(", "),
                attempt
            ));

            let retried = self
                .dispatcher
                .dispatch_attempt(&retry, phase, max_concurrency, attempt)
                .await;

            for (index, result) in failed.into_iter().zip(retried) {
                results[index] = result;
            }
        }

        results
    }

    /// Collects the artifact directory of every target that succeeded
    ///
    /// The rendered directory must stay inside the working directory.
    /// Collection failures never abort the run; they are recorded as
    /// warnings and mark the run degraded.
    async fn collect_artifacts(
        &self,
        dir_template: &str,
        results: &[PhaseResult],
        progress: &mut Progress,
    ) {
        let handles: Vec<_> = results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| {
                let relative = PathBuf::from(
                    self.dispatcher
                        .runner()
                        .vars(&r.target_id)
                        .render(dir_template),
                );
                let workdir = self.config.workdir.clone();
                let collector = Arc::clone(&self.collector);
                let target_id = r.target_id.clone();

                let handle = tokio::spawn(async move {
                    validate_relative(&relative)?;
                    collector
                        .collect_dir(&target_id, &workdir.join(&relative))
                        .await
                });
                (r.target_id.as_str(), handle)
            })
            .collect();

        for (target_id, handle) in handles {
            let failure = match handle.await {
                Ok(Ok(artifacts)) => {
                    info!(
                        "Collected {} artifact(s) for {}",
                        artifacts.len(),
                        target_id
                    );
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => e.to_string(),
            };

            let message = format!("Artifact collection failed for {}: {}", target_id, failure);
            warn!("{}", message);
            self.context.log_warning(message.clone());
            progress.warnings.push(message);
            progress.degraded = true;
        }
    }
}

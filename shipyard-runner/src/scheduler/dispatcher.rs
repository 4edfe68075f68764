//! Parallel dispatcher
//!
//! Runs one phase across a set of targets. Each target gets its own task;
//! a semaphore bounds how many run at once. The dispatcher always waits for
//! every task, so a failing target never cancels its siblings.

use shipyard_core::domain::phase::Phase;
use shipyard_core::domain::result::{FailureReason, PhaseResult};
use shipyard_core::domain::target::{Target, TargetStatus};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::service::PhaseRunner;

/// Fans a phase out across targets and joins the results
pub struct ParallelDispatcher {
    runner: Arc<PhaseRunner>,
}

impl ParallelDispatcher {
    pub fn new(runner: Arc<PhaseRunner>) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &PhaseRunner {
        &self.runner
    }

    /// Runs the first attempt of `phase` for every target
    pub async fn dispatch(
        &self,
        targets: &[Arc<Target>],
        phase: &Phase,
        max_concurrency: Option<usize>,
    ) -> Vec<PhaseResult> {
        self.dispatch_attempt(targets, phase, max_concurrency, 1)
            .await
    }

    /// Runs `phase` for every target, returning one result per target in
    /// the order the targets were given
    pub async fn dispatch_attempt(
        &self,
        targets: &[Arc<Target>],
        phase: &Phase,
        max_concurrency: Option<usize>,
        attempt: u32,
    ) -> Vec<PhaseResult> {
        let limit = effective_limit(targets.len(), phase, max_concurrency);
        let semaphore = Arc::new(Semaphore::new(limit));

        debug!(
            "Dispatching {} to {} target(s), concurrency {}",
            phase.kind,
            targets.len(),
            limit
        );

        let handles: Vec<_> = targets
            .iter()
            .map(|target| {
                let runner = Arc::clone(&self.runner);
                let semaphore = Arc::clone(&semaphore);
                let target = Arc::clone(target);
                let phase = phase.clone();

                tokio::spawn(async move {
                    // Permit is released when dropped at the end of the task
                    let _permit = semaphore.acquire_owned().await;
                    runner.run(&target, &phase, attempt).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (target, handle) in targets.iter().zip(handles) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!("{} task for {} died: {}", phase.kind, target.id(), e);
                    target.set_status(TargetStatus::Failed);
                    results.push(PhaseResult::failed(
                        target.id(),
                        phase.kind,
                        FailureReason::Panicked(e.to_string()),
                        attempt,
                    ));
                }
            }
        }

        results
    }
}

/// Number of targets allowed to run the phase at once
fn effective_limit(targets: usize, phase: &Phase, max_concurrency: Option<usize>) -> usize {
    if !phase.parallel {
        return 1;
    }

    max_concurrency
        .unwrap_or(targets)
        .clamp(1, Semaphore::MAX_PERMITS)
}

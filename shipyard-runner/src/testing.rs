//! Scripted command executor for tests
//!
//! Commands are identified by the `SHIPYARD_PHASE` and `SHIPYARD_TARGET`
//! variables the phase runner sets on every invocation.

use async_trait::async_trait;
use shipyard_core::ExecError;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::executor::{CommandExecutor, CommandOutput, Invocation, OutputSink};

/// Behaviour of one scripted invocation
#[derive(Debug, Clone)]
pub struct Step {
    pub delay: Duration,
    pub exit_code: i32,
    pub output: String,
}

impl Step {
    pub fn ok() -> Self {
        Self {
            delay: Duration::ZERO,
            exit_code: 0,
            output: String::new(),
        }
    }

    pub fn fail(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::ok()
        }
    }

    pub fn hang() -> Self {
        Self {
            delay: Duration::from_secs(24 * 3600),
            ..Self::ok()
        }
    }

    pub fn slow(millis: u64) -> Self {
        Self {
            delay: Duration::from_millis(millis),
            ..Self::ok()
        }
    }

    pub fn with_output(mut self, output: &str) -> Self {
        self.output = output.to_string();
        self
    }
}

/// Executor whose behaviour is scripted per (phase, target)
#[derive(Default)]
pub struct ScriptedExecutor {
    steps: Mutex<HashMap<(String, String), VecDeque<Step>>>,
    calls: Mutex<Vec<(String, String)>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a step for the given phase and target; unscripted calls succeed
    pub fn script(self, phase: &str, target: &str, step: Step) -> Self {
        self.steps
            .lock()
            .unwrap()
            .entry((phase.to_string(), target.to_string()))
            .or_default()
            .push_back(step);
        self
    }

    /// (phase, target) pairs in invocation order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, phase: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(p, _)| p == phase)
            .map(|(_, t)| t)
            .collect()
    }

    /// Highest number of concurrently executing commands observed
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        invocation: &Invocation,
        sink: &OutputSink,
    ) -> Result<CommandOutput, ExecError> {
        let phase = invocation.env.get("SHIPYARD_PHASE").cloned().unwrap_or_default();
        let target = invocation.env.get("SHIPYARD_TARGET").cloned().unwrap_or_default();

        self.calls.lock().unwrap().push((phase.clone(), target.clone()));

        let step = self
            .steps
            .lock()
            .unwrap()
            .get_mut(&(phase, target))
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(Step::ok);

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        // Written up front so a cancelled step still leaves its output behind
        sink.append(step.output.as_bytes());

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        Ok(CommandOutput {
            exit_code: Some(step.exit_code),
            success: step.exit_code == 0,
        })
    }
}

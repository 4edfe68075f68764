//! Shipyard runner
//!
//! Executes a pipeline definition against a trigger event: every phase is
//! fanned out across the targets, joined, and either advances the pipeline
//! or aborts it. Artifacts of succeeding targets are collected into a
//! per-run store and deployment is gated on the branch or tag name.
//!
//! The layers follow the runner's usual split:
//! - `service`: single-target work (phase runner, artifacts, deploy gate)
//! - `scheduler`: fan-out and the pipeline state machine
//! - `executor`: the process boundary

pub mod config;
pub mod context;
pub mod executor;
pub mod report;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::RunnerConfig;
pub use context::RunContext;
pub use executor::{CommandExecutor, CommandOutput, Invocation, OutputSink, ProcessExecutor};
pub use report::{RunOutcome, RunReport, StateTransition};
pub use scheduler::{ParallelDispatcher, PipelineOrchestrator};
pub use service::{ArtifactCollector, DeploymentGate, PhaseRunner, should_deploy};

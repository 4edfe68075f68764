//! Scheduler layer
//!
//! Fans a phase out across targets and drives the pipeline state machine
//! from one phase's join point to the next.

pub mod dispatcher;
pub mod orchestrator;

pub use dispatcher::ParallelDispatcher;
pub use orchestrator::PipelineOrchestrator;

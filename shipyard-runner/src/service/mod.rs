//! Service layer
//!
//! Services contain the per-phase business logic of a run: executing one
//! phase for one target, collecting produced artifacts, and deciding
//! whether a ref may deploy. The scheduler composes them into a pipeline.

mod artifacts;
mod gate;
mod phase_runner;

pub use artifacts::{ArtifactCollector, validate_relative};
pub use gate::{DeploymentGate, should_deploy};
pub use phase_runner::PhaseRunner;

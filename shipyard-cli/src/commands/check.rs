//! `shipyard check`

use anyhow::{Context, Result};
use shipyard_runner::DeploymentGate;
use std::path::Path;
use std::process::ExitCode;

use crate::definition::load_definition;
use crate::output;

/// Loads and validates a definition, then prints what it would run
pub fn handle_check(path: &Path) -> Result<ExitCode> {
    let definition = load_definition(path)?;

    let targets = definition
        .validate()
        .with_context(|| format!("Invalid pipeline definition: {}", path.display()))?;
    let gate = DeploymentGate::from_policy(&definition.deploy)
        .with_context(|| format!("Invalid deploy policy: {}", path.display()))?;

    output::print_definition(&definition, &targets, &gate);

    Ok(ExitCode::SUCCESS)
}

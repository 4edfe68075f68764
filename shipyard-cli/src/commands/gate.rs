//! `shipyard gate`

use anyhow::{Context, Result};
use colored::*;
use shipyard_core::domain::deploy::DeploymentDecision;
use shipyard_runner::DeploymentGate;
use std::path::Path;
use std::process::ExitCode;

use crate::definition::load_definition;

/// Builds the gate from a definition, explicit patterns, or the defaults
fn build_gate(definition: Option<&Path>, allow: Vec<String>) -> Result<DeploymentGate> {
    let gate = match definition {
        Some(path) => {
            let definition = load_definition(path)?;
            DeploymentGate::from_policy(&definition.deploy)
        }
        None if !allow.is_empty() => DeploymentGate::new(&allow),
        None => DeploymentGate::default_allow_list(),
    };

    gate.context("Invalid deploy pattern")
}

/// Prints whether `ref_name` would deploy; exits 1 when it would not
pub fn handle_gate(
    ref_name: &str,
    definition: Option<&Path>,
    allow: Vec<String>,
) -> Result<ExitCode> {
    let gate = build_gate(definition, allow)?;
    let decision = gate.should_deploy(ref_name);

    print_decision(ref_name, &decision);

    Ok(if decision.deploy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_decision(ref_name: &str, decision: &DeploymentDecision) {
    if decision.deploy {
        println!("{} {}", "✓ deploy".green().bold(), ref_name.bold());
    } else {
        println!("{} {}", "✗ no deploy".yellow().bold(), ref_name.bold());
    }
    println!("  {}", decision.reason.dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_gate() {
        assert_eq!(
            handle_gate("master", None, Vec::new()).unwrap(),
            ExitCode::SUCCESS
        );
        assert_eq!(
            handle_gate("feature/x", None, Vec::new()).unwrap(),
            ExitCode::FAILURE
        );
    }

    #[test]
    fn test_explicit_patterns() {
        let allow = vec!["release/.*".to_string()];
        assert_eq!(
            handle_gate("release/2.0", None, allow.clone()).unwrap(),
            ExitCode::SUCCESS
        );
        assert_eq!(
            handle_gate("master", None, allow).unwrap(),
            ExitCode::FAILURE
        );
    }

    #[test]
    fn test_definition_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(
            &path,
            r#"{
                "name": "packages",
                "targets": [{"id": "jessie"}],
                "phases": [{"name": "deploy", "command": ["./ci/deploy.sh"]}],
                "deploy": {"allow": ["stable"]}
            }"#,
        )
        .unwrap();

        assert_eq!(
            handle_gate("stable", Some(&path), Vec::new()).unwrap(),
            ExitCode::SUCCESS
        );
        assert_eq!(
            handle_gate("master", Some(&path), Vec::new()).unwrap(),
            ExitCode::FAILURE
        );
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(handle_gate("master", None, vec!["(".to_string()]).is_err());
    }
}

//! Pipeline definition parser
//!
//! Evaluates a Lua pipeline definition in the sandbox and converts the
//! returned table into a [`PipelineDefinition`].
//!
//! Structural validation (phase order, duplicate targets) is left to
//! [`PipelineDefinition::validate`]; this module only checks shapes and types.

use anyhow::{Context, Result};
use mlua::{Lua, Table, Value};
use shipyard_core::domain::deploy::DeployPolicy;
use shipyard_core::domain::phase::{CommandTemplate, Phase, PhaseKind};
use shipyard_core::domain::pipeline::PipelineDefinition;
use shipyard_core::domain::target::{TargetFlags, TargetSpec};
use std::collections::HashMap;
use std::path::Path;

use crate::sandbox::create_sandbox;

/// Parse a pipeline definition from Lua source code
///
/// # Errors
/// Returns an error if:
/// - The Lua source is invalid or does not return a table
/// - Required fields are missing (name, targets, phases)
/// - Field types are incorrect
///
/// # Example
/// ```no_run
/// use shipyard_lua::parser::parse_pipeline_definition;
///
/// let source = r#"
///     return pipeline.define {
///         name = "packages",
///         targets = { "wheezy", "jessie", { id = "el7", runs_tests = false } },
///         phases = {
///             { name = "dependencies", command = { "./ci/deps.sh", "{target}" } },
///             { name = "test", command = { "./ci/test.sh", "{target}" } },
///         },
///     }
/// "#;
///
/// let definition = parse_pipeline_definition(source)?;
/// assert_eq!(definition.targets.len(), 3);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn parse_pipeline_definition(source: &str) -> Result<PipelineDefinition> {
    let lua = create_sandbox().context("Failed to create definition sandbox")?;

    let pipeline: Table = lua
        .load(source)
        .set_name("pipeline")
        .eval()
        .context("Failed to evaluate pipeline definition")?;

    let name: String = pipeline
        .get("name")
        .context("Pipeline must have a 'name' field")?;

    let description: Option<String> = pipeline
        .get("description")
        .context("Field 'description' must be a string")?;

    let targets = parse_targets(&lua, &pipeline)?;
    let phases = parse_phases(&lua, &pipeline)?;
    let deploy = parse_deploy(&pipeline)?;

    let max_concurrency: Option<usize> = pipeline
        .get("max_concurrency")
        .context("Field 'max_concurrency' must be a positive integer")?;

    let env = parse_env(&pipeline)?;

    Ok(PipelineDefinition {
        name,
        description,
        targets,
        phases,
        deploy,
        max_concurrency,
        env,
    })
}

/// Read and parse a Lua definition file
pub fn parse_pipeline_file(path: &Path) -> Result<PipelineDefinition> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read definition file: {}", path.display()))?;

    parse_pipeline_definition(&source)
        .with_context(|| format!("Failed to parse definition file: {}", path.display()))
}

/// Parse the 'targets' field
///
/// Entries are either a bare id string or a table `{ id = ..., runs_tests = ... }`.
fn parse_targets(lua: &Lua, pipeline: &Table) -> Result<Vec<TargetSpec>> {
    let targets_table: Table = pipeline
        .get("targets")
        .context("Pipeline must have a 'targets' array")?;

    let mut targets = Vec::new();

    for entry in targets_table.sequence_values::<Value>() {
        let entry = entry.context("Failed to read target entry")?;

        let target = match entry {
            Value::String(_) => TargetSpec::new(lua.unpack::<String>(entry)?),
            Value::Table(table) => {
                let id: String = table.get("id").context("Target must have an 'id' field")?;
                let runs_tests: Option<bool> = table
                    .get("runs_tests")
                    .context(format!("Target '{}': 'runs_tests' must be a boolean", id))?;

                TargetSpec {
                    id,
                    flags: TargetFlags {
                        runs_tests: runs_tests.unwrap_or(true),
                    },
                }
            }
            other => {
                return Err(anyhow::anyhow!(
                    "Target entries must be strings or tables, got {}",
                    other.type_name()
                ));
            }
        };

        targets.push(target);
    }

    Ok(targets)
}

/// Parse the 'phases' field
fn parse_phases(lua: &Lua, pipeline: &Table) -> Result<Vec<Phase>> {
    let phases_table: Table = pipeline
        .get("phases")
        .context("Pipeline must have a 'phases' array")?;

    let mut phases = Vec::new();

    for entry in phases_table.sequence_values::<Table>() {
        let phase_table = entry.context("Failed to read phase entry")?;

        let name: String = phase_table
            .get("name")
            .context("Phase must have a 'name' field")?;
        let kind: PhaseKind = name.parse()?;

        let command_value: Value = phase_table.get("command")?;
        let command = parse_command(lua, kind, command_value)?;

        let parallel: Option<bool> = phase_table
            .get("parallel")
            .context(format!("Phase '{}': 'parallel' must be a boolean", kind))?;
        let best_effort: Option<bool> = phase_table
            .get("best_effort")
            .context(format!("Phase '{}': 'best_effort' must be a boolean", kind))?;
        let timeout_seconds: Option<u64> = phase_table
            .get("timeout")
            .context(format!("Phase '{}': 'timeout' must be seconds", kind))?;
        let retries: Option<u32> = phase_table
            .get("retries")
            .context(format!("Phase '{}': 'retries' must be an integer", kind))?;
        let artifacts: Option<String> = phase_table
            .get("artifacts")
            .context(format!("Phase '{}': 'artifacts' must be a path", kind))?;

        phases.push(Phase {
            kind,
            command,
            parallel: parallel.unwrap_or(true),
            best_effort: best_effort.unwrap_or(false),
            timeout_seconds,
            retries: retries.unwrap_or(0),
            artifacts,
        });
    }

    Ok(phases)
}

/// Parse a phase command
///
/// An array is taken as argv; a single string runs through `sh -c`.
fn parse_command(lua: &Lua, kind: PhaseKind, value: Value) -> Result<CommandTemplate> {
    match value {
        Value::Table(table) => {
            let mut argv = Vec::new();
            for arg in table.sequence_values::<String>() {
                argv.push(arg.context(format!(
                    "Phase '{}': command arguments must be strings",
                    kind
                ))?);
            }
            Ok(CommandTemplate::new(argv))
        }
        Value::String(_) => {
            let script = lua.unpack::<String>(value)?;
            Ok(CommandTemplate::new(["sh".to_string(), "-c".to_string(), script]))
        }
        Value::Nil => Err(anyhow::anyhow!("Phase '{}' must have a 'command' field", kind)),
        other => Err(anyhow::anyhow!(
            "Phase '{}': 'command' must be an array or a string, got {}",
            kind,
            other.type_name()
        )),
    }
}

/// Parse the optional 'deploy' field
fn parse_deploy(pipeline: &Table) -> Result<DeployPolicy> {
    let deploy_value: Value = pipeline.get("deploy").unwrap_or(Value::Nil);

    match deploy_value {
        Value::Nil => Ok(DeployPolicy::default()),
        Value::Table(table) => {
            let allow_value: Value = table.get("allow").unwrap_or(Value::Nil);
            match allow_value {
                Value::Nil => Ok(DeployPolicy::default()),
                Value::Table(allow_table) => {
                    let mut allow = Vec::new();
                    for pattern in allow_table.sequence_values::<String>() {
                        allow.push(pattern.context("Deploy patterns must be strings")?);
                    }
                    Ok(DeployPolicy { allow })
                }
                _ => Err(anyhow::anyhow!(
                    "Field 'deploy.allow' must be an array of patterns"
                )),
            }
        }
        _ => Err(anyhow::anyhow!("Field 'deploy' must be a table")),
    }
}

/// Parse the optional 'env' field
fn parse_env(pipeline: &Table) -> Result<HashMap<String, String>> {
    let env_value: Value = pipeline.get("env").unwrap_or(Value::Nil);

    match env_value {
        Value::Nil => Ok(HashMap::new()),
        Value::Table(table) => {
            let mut env = HashMap::new();
            for pair in table.pairs::<String, String>() {
                let (key, value) = pair.context("Environment entries must be string pairs")?;
                env.insert(key, value);
            }
            Ok(env)
        }
        _ => Err(anyhow::anyhow!("Field 'env' must be a table")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const PACKAGES: &str = r#"
        return pipeline.define {
            name = "packages",
            description = "Debian and EL packages",
            max_concurrency = 4,
            env = { DEBIAN_FRONTEND = "noninteractive" },
            targets = {
                "wheezy",
                pipeline.target("jessie"),
                { id = "el7", runs_tests = false },
            },
            phases = {
                { name = "checkout", command = { "git", "checkout", "{commit}" }, parallel = false },
                { name = "dependencies", command = "./ci/deps.sh {target}" },
                { name = "test", command = { "./ci/test.sh", "{target}" }, timeout = 1800, artifacts = "out/{target}" },
                pipeline.phase("deploy", { "./ci/deploy.sh", "{target}" }, { retries = 1 }),
            },
            deploy = { allow = { "master", [[v\d+(\.\d+)*]] } },
        }
    "#;

    #[test]
    fn test_parse_full_definition() {
        let definition = parse_pipeline_definition(PACKAGES).unwrap();

        assert_eq!(definition.name, "packages");
        assert_eq!(definition.description.as_deref(), Some("Debian and EL packages"));
        assert_eq!(definition.max_concurrency, Some(4));
        assert_eq!(
            definition.env.get("DEBIAN_FRONTEND").map(String::as_str),
            Some("noninteractive")
        );

        let ids: Vec<&str> = definition.targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["wheezy", "jessie", "el7"]);
        assert!(definition.targets[0].flags.runs_tests);
        assert!(!definition.targets[2].flags.runs_tests);

        let kinds: Vec<PhaseKind> = definition.phases.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, PhaseKind::ALL.to_vec());

        let checkout = definition.phase(PhaseKind::Checkout).unwrap();
        assert!(!checkout.parallel);

        let deps = definition.phase(PhaseKind::Dependencies).unwrap();
        assert_eq!(deps.command.argv(), ["sh", "-c", "./ci/deps.sh {target}"]);

        let test = definition.phase(PhaseKind::Test).unwrap();
        assert_eq!(test.timeout(), Some(Duration::from_secs(1800)));
        assert_eq!(test.artifacts.as_deref(), Some("out/{target}"));

        let deploy = definition.phase(PhaseKind::Deploy).unwrap();
        assert_eq!(deploy.retries, 1);
        assert!(!deploy.best_effort);

        assert_eq!(definition.deploy.allow, vec!["master", r"v\d+(\.\d+)*"]);
        assert!(definition.validate().is_ok());
    }

    #[test]
    fn test_deploy_defaults_when_absent() {
        let definition = parse_pipeline_definition(
            r#"
            return {
                name = "minimal",
                targets = { "el7" },
                phases = { { name = "test", command = { "true" } } },
            }
        "#,
        )
        .unwrap();

        assert_eq!(definition.deploy, DeployPolicy::default());
        assert!(definition.env.is_empty());
        assert!(definition.max_concurrency.is_none());
    }

    #[test]
    fn test_missing_name_fails() {
        let result = parse_pipeline_definition(
            r#"return { targets = { "el7" }, phases = {} }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_phase_fails() {
        let result = parse_pipeline_definition(
            r#"
            return {
                name = "bad",
                targets = { "el7" },
                phases = { { name = "package", command = { "true" } } },
            }
        "#,
        );
        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("unknown phase"));
    }

    #[test]
    fn test_missing_command_fails() {
        let result = parse_pipeline_definition(
            r#"
            return {
                name = "bad",
                targets = { "el7" },
                phases = { { name = "test" } },
            }
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_target_entry_fails() {
        let result = parse_pipeline_definition(
            r#"
            return {
                name = "bad",
                targets = { 42 },
                phases = { { name = "test", command = { "true" } } },
            }
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_definition_cannot_read_files() {
        let result = parse_pipeline_definition(
            r#"
            local f = io.open("/etc/hostname")
            return { name = "sneaky", targets = { "el7" }, phases = {} }
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_pipeline_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.lua");
        std::fs::write(&path, PACKAGES).unwrap();

        let definition = parse_pipeline_file(&path).unwrap();
        assert_eq!(definition.name, "packages");

        let missing = parse_pipeline_file(&dir.path().join("missing.lua"));
        assert!(missing.is_err());
    }
}

//! `shipyard run`
//!
//! Builds the runner configuration from flags and environment variables,
//! runs the pipeline and prints the report.

use anyhow::{Context, Result};
use clap::Args;
use shipyard_core::domain::trigger::TriggerEvent;
use shipyard_runner::{PipelineOrchestrator, ProcessExecutor, RunnerConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::definition::load_definition;
use crate::output;

#[derive(Args)]
pub struct RunArgs {
    /// Path to the definition file (.lua or .json)
    #[arg(short, long, env = "SHIPYARD_DEFINITION")]
    definition: PathBuf,

    /// Branch (or tag, with --tag) that triggered the run
    #[arg(short, long, env = "SHIPYARD_BRANCH")]
    branch: String,

    /// Commit being built
    #[arg(short, long, env = "SHIPYARD_COMMIT", default_value = "HEAD")]
    commit: String,

    /// Treat the ref as a tag
    #[arg(long)]
    tag: bool,

    /// Directory phase commands run in
    #[arg(long, env = "SHIPYARD_WORKDIR", default_value = ".")]
    workdir: PathBuf,

    /// Root of the artifact store
    #[arg(long, env = "SHIPYARD_ARTIFACT_DIR", default_value = ".shipyard/artifacts")]
    artifact_dir: PathBuf,

    /// Maximum number of targets running at once (overrides the definition)
    #[arg(long, env = "SHIPYARD_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    /// Default phase timeout in seconds
    #[arg(long, env = "SHIPYARD_PHASE_TIMEOUT")]
    timeout: Option<u64>,

    /// Extra environment for every command, as KEY=value
    #[arg(short, long, value_parser = parse_key_val)]
    env: Vec<(String, String)>,

    /// Start commands from an empty environment instead of inheriting ours
    #[arg(long)]
    clean_env: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Include command output and the run log in the report
    #[arg(short, long)]
    verbose: bool,
}

impl RunArgs {
    fn trigger(&self) -> TriggerEvent {
        if self.tag {
            TriggerEvent::tag(&self.branch, &self.commit)
        } else {
            TriggerEvent::branch(&self.branch, &self.commit)
        }
    }

    fn runner_config(&self) -> RunnerConfig {
        let mut config = RunnerConfig::new(&self.workdir, &self.artifact_dir);

        if let Some(max) = self.max_concurrency {
            config = config.with_max_concurrency(max);
        }
        if let Some(seconds) = self.timeout {
            config = config.with_default_timeout(Duration::from_secs(seconds));
        }
        for (key, value) in &self.env {
            config = config.with_env(key, value);
        }
        config.inherit_env = !self.clean_env;

        config
    }
}

/// Parse a single key=value pair
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow::anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

pub async fn handle_run(args: RunArgs) -> Result<ExitCode> {
    let definition = load_definition(&args.definition)?;
    let trigger = args.trigger();

    let orchestrator = PipelineOrchestrator::new(
        definition,
        args.runner_config(),
        trigger,
        Arc::new(ProcessExecutor::new()),
    )
    .context("Invalid pipeline configuration")?;

    info!("Run {} prepared", orchestrator.run_id());

    let report = orchestrator.run().await;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        output::print_report(&report, args.verbose);
    }

    Ok(if report.is_aborted() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: RunArgs,
    }

    fn parse(argv: &[&str]) -> RunArgs {
        TestCli::try_parse_from(std::iter::once("shipyard").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("BINTRAY_USER=ci").unwrap(),
            ("BINTRAY_USER".to_string(), "ci".to_string())
        );
        assert_eq!(
            parse_key_val("TOKEN=a=b").unwrap(),
            ("TOKEN".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
    }

    #[test]
    fn test_runner_config_from_flags() {
        let args = parse(&[
            "--definition",
            "pipeline.lua",
            "--branch",
            "v1.2.3",
            "--tag",
            "--max-concurrency",
            "2",
            "--timeout",
            "90",
            "--env",
            "REPO=stable",
            "--clean-env",
        ]);

        let trigger = args.trigger();
        assert!(trigger.is_tag);
        assert_eq!(trigger.ref_name(), "v1.2.3");

        let config = args.runner_config();
        assert_eq!(config.max_concurrency, Some(2));
        assert_eq!(config.default_timeout, Duration::from_secs(90));
        assert_eq!(config.env.get("REPO").map(String::as_str), Some("stable"));
        assert!(!config.inherit_env);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_run_json_definition_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let definition = dir.path().join("pipeline.json");
        std::fs::write(
            &definition,
            r#"{
                "name": "packages",
                "targets": [{"id": "wheezy"}, {"id": "el7", "runs_tests": false}],
                "phases": [
                    {"name": "test", "command": ["sh", "-c", "mkdir -p out/{target} && echo ok > out/{target}/result.txt"]},
                    {"name": "deploy", "command": ["sh", "-c", "exit 0"]}
                ]
            }"#,
        )
        .unwrap();

        let workdir = dir.path().to_str().unwrap();
        let artifacts = dir.path().join("store");
        let args = parse(&[
            "--definition",
            definition.to_str().unwrap(),
            "--branch",
            "feature/x",
            "--workdir",
            workdir,
            "--artifact-dir",
            artifacts.to_str().unwrap(),
        ]);

        let code = handle_run(args).await.unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(dir.path().join("out/wheezy/result.txt").is_file());
        assert!(!dir.path().join("out/el7").exists());
    }
}

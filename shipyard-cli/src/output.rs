//! Terminal output for reports and definitions

use colored::*;
use shipyard_core::domain::log::LogLevel;
use shipyard_core::domain::phase::PhaseKind;
use shipyard_core::domain::pipeline::{PipelineDefinition, PipelineState};
use shipyard_core::domain::result::{PhaseOutcome, PhaseResult};
use shipyard_core::domain::target::TargetSet;
use shipyard_runner::{DeploymentGate, RunOutcome, RunReport};

pub fn print_report(report: &RunReport, verbose: bool) {
    println!(
        "{} {} ({} {} @ {})",
        "Pipeline".bold(),
        report.pipeline.cyan(),
        report.trigger.ref_kind(),
        report.trigger.ref_name().bold(),
        short_sha(&report.trigger.commit_sha)
    );
    println!("  Run ID: {}", report.run_id.to_string().dimmed());
    println!();

    for phase in PhaseKind::ALL {
        let results = report.results_for(phase);
        if results.is_empty() {
            continue;
        }

        println!("{}", phase.as_str().bold());
        for result in results {
            print_result(result, verbose);
        }
    }

    if !report.artifacts.is_empty() {
        println!();
        println!("{}", "Artifacts".bold());
        for artifact in &report.artifacts {
            println!(
                "  {} {} ({} bytes, sha256 {})",
                artifact.target_id.cyan(),
                artifact.relative_path.display(),
                artifact.size,
                &artifact.sha256[..artifact.sha256.len().min(12)]
            );
        }
    }

    println!();
    let deploy_line = if !report.deployment.deploy {
        format!("skipped ({})", report.deployment.reason).yellow()
    } else if report.deploy_ran {
        format!("ran ({})", report.deployment.reason).normal()
    } else {
        format!("not reached ({})", report.deployment.reason).yellow()
    };
    println!("{} {}", "Deploy:".bold(), deploy_line);

    for warning in &report.warnings {
        println!("{} {}", "warning:".yellow().bold(), warning);
    }

    if verbose && !report.logs.is_empty() {
        println!();
        println!("{}", "Run log".bold());
        for entry in &report.logs {
            let level = match entry.level {
                LogLevel::Debug => entry.level.to_string().dimmed(),
                LogLevel::Info => entry.level.to_string().blue(),
                LogLevel::Warning => entry.level.to_string().yellow(),
                LogLevel::Error => entry.level.to_string().red(),
            };
            println!(
                "  {} [{}] {}",
                entry.timestamp.format("%H:%M:%S").to_string().dimmed(),
                level,
                entry.message
            );
        }
    }

    println!();
    let state = match report.state {
        PipelineState::Done => report.state.to_string().green().bold(),
        _ => report.state.to_string().red().bold(),
    };
    let outcome = match report.outcome() {
        RunOutcome::Success => report.outcome().to_string().green(),
        RunOutcome::PartialSuccess => report.outcome().to_string().yellow(),
        RunOutcome::Failed => report.outcome().to_string().red(),
    };
    println!(
        "{} {}, {} in {:.1}s",
        "Result:".bold(),
        state,
        outcome,
        report.duration().as_secs_f64()
    );
}

fn print_result(result: &PhaseResult, verbose: bool) {
    let status = match &result.outcome {
        PhaseOutcome::Succeeded => "✓".green(),
        PhaseOutcome::Skipped => "-".dimmed(),
        PhaseOutcome::Failed(_) => "✗".red(),
    };

    let mut line = format!(
        "  {} {:<12} {}",
        status,
        result.target_id,
        result.outcome.to_string()
    );
    if let Some(reason) = result.failure_reason() {
        line.push_str(&format!(": {}", reason));
    }
    if result.attempt > 1 {
        line.push_str(&format!(" (attempt {})", result.attempt));
    }
    if result.outcome != PhaseOutcome::Skipped {
        line.push_str(&format!(" [{:.1}s]", result.duration().as_secs_f64()));
    }
    println!("{}", line);

    // Output of failures is always worth showing
    if (verbose || result.is_failure()) && !result.output.is_empty() {
        for output_line in result.output.lines() {
            println!("      {}", output_line.dimmed());
        }
    }
}

pub fn print_definition(
    definition: &PipelineDefinition,
    targets: &TargetSet,
    gate: &DeploymentGate,
) {
    println!("{}", "✓ Definition is valid".green().bold());
    println!("  Name:    {}", definition.name.bold());
    if let Some(description) = &definition.description {
        println!("  About:   {}", description.dimmed());
    }

    println!("  Targets:");
    for target in targets.targets() {
        let note = if target.flags().runs_tests {
            String::new()
        } else {
            " (no tests)".to_string()
        };
        println!("    - {}{}", target.id().cyan(), note.dimmed());
    }

    println!("  Phases:");
    for phase in &definition.phases {
        let mut flags = Vec::new();
        if !phase.parallel {
            flags.push("sequential".to_string());
        }
        if phase.best_effort {
            flags.push("best-effort".to_string());
        }
        if let Some(timeout) = phase.timeout_seconds {
            flags.push(format!("timeout {}s", timeout));
        }
        if phase.retries > 0 {
            flags.push(format!("retries {}", phase.retries));
        }
        if let Some(dir) = &phase.artifacts {
            flags.push(format!("artifacts {}", dir));
        }

        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!(
            "    - {:<13} {}{}",
            phase.kind.as_str().bold(),
            phase.command,
            flags.dimmed()
        );
    }

    println!(
        "  Deploys: {}",
        gate.patterns().collect::<Vec<_>>().join(", ").dimmed()
    );
    if let Some(max) = definition.max_concurrency {
        println!("  Max concurrency: {}", max);
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}

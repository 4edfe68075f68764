//! Phase domain types

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Pipeline phases, in their fixed execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Checkout,
    #[serde(alias = "deps")]
    Dependencies,
    Test,
    Deploy,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 4] = [
        PhaseKind::Checkout,
        PhaseKind::Dependencies,
        PhaseKind::Test,
        PhaseKind::Deploy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Checkout => "checkout",
            PhaseKind::Dependencies => "dependencies",
            PhaseKind::Test => "test",
            PhaseKind::Deploy => "deploy",
        }
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "checkout" => Ok(PhaseKind::Checkout),
            "dependencies" | "deps" => Ok(PhaseKind::Dependencies),
            "test" => Ok(PhaseKind::Test),
            "deploy" => Ok(PhaseKind::Deploy),
            other => Err(ConfigError::Definition(format!("unknown phase '{}'", other))),
        }
    }
}

/// Values substituted into command and artifact templates
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub target: &'a str,
    pub branch: &'a str,
    pub commit: &'a str,
}

impl TemplateVars<'_> {
    /// Replaces `{target}`, `{branch}` and `{commit}` in `input`
    pub fn render(&self, input: &str) -> String {
        input
            .replace("{target}", self.target)
            .replace("{branch}", self.branch)
            .replace("{commit}", self.commit)
    }
}

/// Command line of a phase: program followed by its arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(Vec<String>);

impl CommandTemplate {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(argv.into_iter().map(Into::into).collect())
    }

    pub fn argv(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders every argument against the given variables
    pub fn render(&self, vars: &TemplateVars<'_>) -> Vec<String> {
        self.0.iter().map(|arg| vars.render(arg)).collect()
    }
}

impl std::fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// A named stage of the pipeline applied to every target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    #[serde(rename = "name")]
    pub kind: PhaseKind,
    pub command: CommandTemplate,
    /// When false the phase runs one target at a time
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Failures are recorded but do not abort the pipeline
    #[serde(default)]
    pub best_effort: bool,
    #[serde(default, alias = "timeout")]
    pub timeout_seconds: Option<u64>,
    /// Additional attempts granted to failed targets
    #[serde(default)]
    pub retries: u32,
    /// Directory template, relative to the working directory, collected
    /// for each target that succeeds this phase
    #[serde(default)]
    pub artifacts: Option<String>,
}

fn default_parallel() -> bool {
    true
}

impl Phase {
    pub fn new(kind: PhaseKind, command: CommandTemplate) -> Self {
        Self {
            kind,
            command,
            parallel: true,
            best_effort: false,
            timeout_seconds: None,
            retries: 0,
            artifacts: None,
        }
    }

    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = Some(timeout.as_secs());
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_artifacts(mut self, dir: impl Into<String>) -> Self {
        self.artifacts = Some(dir.into());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }

    /// Validates a single phase definition
    pub fn validate(&self) -> Result<(), ConfigError> {
        let malformed = |reason: &str| ConfigError::MalformedPhase {
            phase: self.kind,
            reason: reason.to_string(),
        };

        match self.command.argv().first() {
            None => return Err(malformed("command is empty")),
            Some(program) if program.trim().is_empty() => {
                return Err(malformed("command program is blank"));
            }
            Some(_) => {}
        }

        if self.timeout_seconds == Some(0) {
            return Err(malformed("timeout must be greater than 0"));
        }

        if let Some(dir) = &self.artifacts {
            if dir.trim().is_empty() {
                return Err(malformed("artifacts directory is blank"));
            }
            if Path::new(dir).is_absolute() {
                return Err(malformed("artifacts directory must be relative"));
            }
        }

        Ok(())
    }
}

/// Validates a list of phases: each well-formed, declared once, in fixed order
pub fn validate_phases(phases: &[Phase]) -> Result<(), ConfigError> {
    if phases.is_empty() {
        return Err(ConfigError::NoPhases);
    }

    for phase in phases {
        phase.validate()?;
    }

    for pair in phases.windows(2) {
        if pair[1].kind <= pair[0].kind {
            return Err(ConfigError::PhaseOrder {
                phase: pair[1].kind,
                previous: pair[0].kind,
            });
        }
    }

    Ok(())
}

//! Deployment policy and decision types

use serde::{Deserialize, Serialize};

/// Refs allowed to deploy when a definition does not say otherwise:
/// the `master` branch and semantic-version tags.
pub const DEFAULT_ALLOWED_REFS: &[&str] = &["master", r"v\d+(\.\d+)*"];

/// Deployment section of a pipeline definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployPolicy {
    /// Regular expressions matched against the whole branch or tag name
    #[serde(default = "default_allow")]
    pub allow: Vec<String>,
}

fn default_allow() -> Vec<String> {
    DEFAULT_ALLOWED_REFS.iter().map(|s| s.to_string()).collect()
}

impl Default for DeployPolicy {
    fn default() -> Self {
        Self {
            allow: default_allow(),
        }
    }
}

/// Whether a run deploys, and why
///
/// Derived once per run. A negative decision is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDecision {
    pub deploy: bool,
    pub reason: String,
    pub matched_pattern: Option<String>,
}

impl DeploymentDecision {
    pub fn allowed(ref_name: &str, pattern: &str) -> Self {
        Self {
            deploy: true,
            reason: format!("'{}' matches allowed pattern '{}'", ref_name, pattern),
            matched_pattern: Some(pattern.to_string()),
        }
    }

    pub fn denied(ref_name: &str) -> Self {
        Self {
            deploy: false,
            reason: format!("'{}' matches no allowed deploy pattern", ref_name),
            matched_pattern: None,
        }
    }
}

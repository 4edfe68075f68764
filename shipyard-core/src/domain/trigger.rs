//! Trigger event domain type

use serde::{Deserialize, Serialize};

/// The version-control event that started a run
///
/// Only these three fields are consumed from the external event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Branch name, or tag name when `is_tag` is set
    pub branch: String,
    pub commit_sha: String,
    pub is_tag: bool,
}

impl TriggerEvent {
    pub fn branch(branch: impl Into<String>, commit_sha: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            commit_sha: commit_sha.into(),
            is_tag: false,
        }
    }

    pub fn tag(tag: impl Into<String>, commit_sha: impl Into<String>) -> Self {
        Self {
            branch: tag.into(),
            commit_sha: commit_sha.into(),
            is_tag: true,
        }
    }

    /// Name evaluated by the deployment gate
    pub fn ref_name(&self) -> &str {
        &self.branch
    }

    pub fn ref_kind(&self) -> &'static str {
        if self.is_tag { "tag" } else { "branch" }
    }
}

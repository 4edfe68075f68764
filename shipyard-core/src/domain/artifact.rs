//! Artifact domain types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file produced by a target and held in the run's artifact store
///
/// Identified by `(target_id, relative_path)`; collecting the same key again
/// replaces the stored copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub target_id: String,
    /// Path relative to the target's output directory
    pub relative_path: PathBuf,
    /// Location of the copy inside the store
    pub stored_at: PathBuf,
    pub size: u64,
    /// Hex-encoded SHA-256 of the stored bytes
    pub sha256: String,
    pub collected_at: chrono::DateTime<chrono::Utc>,
}

impl Artifact {
    pub fn key(&self) -> (&str, &std::path::Path) {
        (self.target_id.as_str(), self.relative_path.as_path())
    }
}

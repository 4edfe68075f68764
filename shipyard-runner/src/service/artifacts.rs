//! Artifact collection
//!
//! Copies files produced by targets into a per-run store laid out as
//! `<store>/<target_id>/<relative_path>`. Collecting the same key twice
//! replaces the earlier copy. Writes are serialised per target id so
//! concurrent collection from different workers never interleaves on a key.

use sha2::{Digest, Sha256};
use shipyard_core::CollectionError;
use shipyard_core::domain::artifact::Artifact;
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;
use uuid::Uuid;

type ArtifactKey = (String, PathBuf);

/// Shared artifact store for one run
pub struct ArtifactCollector {
    store_root: PathBuf,
    index: Mutex<BTreeMap<ArtifactKey, Artifact>>,
    target_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ArtifactCollector {
    /// Creates a collector storing under `<artifact_dir>/<run_id>`
    pub fn new(artifact_dir: &Path, run_id: Uuid) -> Self {
        Self::with_store_root(artifact_dir.join(run_id.to_string()))
    }

    pub fn with_store_root(store_root: PathBuf) -> Self {
        Self {
            store_root,
            index: Mutex::new(BTreeMap::new()),
            target_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store_root(&self) -> &Path {
        &self.store_root
    }

    /// Copies `source_root/relative` into the store for `target_id`
    ///
    /// # Errors
    /// Fails if the path is absolute or escapes its root (directly or through
    /// a symlink), if the source is not a regular file, or on any filesystem
    /// error.
    pub async fn collect(
        &self,
        target_id: &str,
        source_root: &Path,
        relative: &Path,
    ) -> Result<Artifact, CollectionError> {
        validate_relative(Path::new(target_id))?;
        validate_relative(relative)?;

        let lock = self.target_lock(target_id);
        let _guard = lock.lock().await;

        let source = source_root.join(relative);
        let metadata = tokio::fs::metadata(&source)
            .await
            .map_err(|e| CollectionError::io(&source, e))?;
        if !metadata.is_file() {
            return Err(CollectionError::NotAFile(source));
        }

        let root = canonical(source_root).await?;
        if !canonical(&source).await?.starts_with(&root) {
            return Err(CollectionError::InvalidPath(relative.to_path_buf()));
        }

        let dest = self.store_root.join(target_id).join(relative);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CollectionError::io(parent, e))?;
        }

        let (size, sha256) = copy_and_hash(&source, &dest).await?;

        let artifact = Artifact {
            target_id: target_id.to_string(),
            relative_path: relative.to_path_buf(),
            stored_at: dest,
            size,
            sha256,
            collected_at: chrono::Utc::now(),
        };

        debug!(
            "Collected {} for {} ({} bytes)",
            relative.display(),
            target_id,
            size
        );

        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (target_id.to_string(), relative.to_path_buf()),
                artifact.clone(),
            );

        Ok(artifact)
    }

    /// Collects every file below `source_root`, preserving relative paths
    pub async fn collect_dir(
        &self,
        target_id: &str,
        source_root: &Path,
    ) -> Result<Vec<Artifact>, CollectionError> {
        let files = list_files(source_root).await?;

        let mut artifacts = Vec::with_capacity(files.len());
        for relative in files {
            artifacts.push(self.collect(target_id, source_root, &relative).await?);
        }

        Ok(artifacts)
    }

    /// All collected artifacts, ordered by target id then path
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn get(&self, target_id: &str, relative: &Path) -> Option<Artifact> {
        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(target_id.to_string(), relative.to_path_buf()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.index.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn target_lock(&self, target_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .target_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(target_id.to_string()).or_default())
    }
}

/// Copies `source` to `dest` in fixed-size chunks, hashing as it goes
///
/// Returns the number of bytes written and the hex SHA-256 digest.
async fn copy_and_hash(source: &Path, dest: &Path) -> Result<(u64, String), CollectionError> {
    let mut input = tokio::fs::File::open(source)
        .await
        .map_err(|e| CollectionError::io(source, e))?;
    let mut output = tokio::fs::File::create(dest)
        .await
        .map_err(|e| CollectionError::io(dest, e))?;

    let mut hasher = Sha256::new();
    let mut size = 0u64;
    let mut data = vec![0u8; 64 * 1024];

    loop {
        let count = input
            .read(&mut data)
            .await
            .map_err(|e| CollectionError::io(source, e))?;
        if count == 0 {
            break;
        }

        hasher.update(&data[..count]);
        output
            .write_all(&data[..count])
            .await
            .map_err(|e| CollectionError::io(dest, e))?;
        size += count as u64;
    }

    output
        .flush()
        .await
        .map_err(|e| CollectionError::io(dest, e))?;

    Ok((size, format!("{:x}", hasher.finalize())))
}

async fn canonical(path: &Path) -> Result<PathBuf, CollectionError> {
    tokio::fs::canonicalize(path)
        .await
        .map_err(|e| CollectionError::io(path, e))
}

/// Rejects empty, absolute and parent-escaping paths
pub fn validate_relative(path: &Path) -> Result<(), CollectionError> {
    let mut normal = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            _ => return Err(CollectionError::InvalidPath(path.to_path_buf())),
        }
    }

    if normal == 0 {
        return Err(CollectionError::InvalidPath(path.to_path_buf()));
    }

    Ok(())
}

/// Lists regular files below `root` as sorted relative paths
///
/// Symlinks are followed only when they resolve to a file inside `root`.
async fn list_files(root: &Path) -> Result<Vec<PathBuf>, CollectionError> {
    let canonical_root = canonical(root).await?;
    let mut files = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(relative_dir) = pending.pop() {
        let dir = root.join(&relative_dir);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| CollectionError::io(&dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CollectionError::io(&dir, e))?
        {
            let relative = relative_dir.join(entry.file_name());
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| CollectionError::io(entry.path(), e))?;

            if file_type.is_dir() {
                pending.push(relative);
            } else if file_type.is_file() {
                files.push(relative);
            } else if file_type.is_symlink() {
                let contained = match tokio::fs::canonicalize(entry.path()).await {
                    Ok(resolved) if resolved.starts_with(&canonical_root) => {
                        tokio::fs::metadata(&resolved)
                            .await
                            .is_ok_and(|m| m.is_file())
                    }
                    _ => false,
                };

                if contained {
                    files.push(relative);
                } else {
                    debug!("Skipping symlink {}", entry.path().display());
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

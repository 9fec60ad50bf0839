//! Atomic persistence for checkpoint snapshots.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error_handling::CollectorError;

use super::CheckpointSnapshot;

/// Reads and writes [`CheckpointSnapshot`]s at a fixed path.
///
/// Saves go through a temp file and a rename so a crash mid-write leaves
/// the previous checkpoint intact rather than a truncated file.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the checkpoint file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot from disk, if a readable one exists.
    ///
    /// A missing file is the normal fresh-start case and returns `None`
    /// silently. Unreadable or corrupt files also return `None`, with a
    /// warning, so a damaged checkpoint degrades to a fresh run instead
    /// of blocking collection.
    pub async fn load(&self) -> Option<CheckpointSnapshot> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read checkpoint {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<CheckpointSnapshot>(&bytes) {
            Ok(snapshot) => {
                info!(
                    "Resuming from checkpoint {}: {} cached resources, {} owners listed{}",
                    self.path.display(),
                    snapshot.resources.len(),
                    snapshot.owner_references.len(),
                    if snapshot.references_complete {
                        " (reference gathering already complete)"
                    } else {
                        ""
                    }
                );
                Some(snapshot)
            }
            Err(e) => {
                warn!(
                    "Ignoring corrupt checkpoint {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    /// Persist the snapshot, replacing any previous checkpoint.
    pub async fn save(&self, snapshot: &CheckpointSnapshot) -> Result<(), CollectorError> {
        let bytes = serde_json::to_vec(snapshot)?;

        // Write to temp file first, then rename for atomicity.
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &bytes).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!(
            "Checkpoint saved to {} ({} resources, {} owners)",
            self.path.display(),
            snapshot.resources.len(),
            snapshot.owner_references.len()
        );
        Ok(())
    }

    /// Remove the checkpoint file after a fully successful run.
    ///
    /// Best effort: a missing file is fine, any other failure is logged
    /// and swallowed since the collected result has already been produced.
    pub async fn delete(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Removed checkpoint {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove checkpoint {}: {}", self.path.display(), e),
        }
    }
}

//! Serialized shape of an in-progress collection run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Durable snapshot of collection progress.
///
/// Saved periodically during the fetch phase and on any abort, and loaded
/// once at collector start. Maps are ordered so consecutive saves of the
/// same state produce byte-identical files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointSnapshot {
    /// Fetched payloads keyed by resource ID.
    pub resources: BTreeMap<String, Value>,
    /// Reference lists gathered so far, keyed by owner ID.
    pub owner_references: BTreeMap<String, Vec<String>>,
    /// Owners whose reference listing came back empty.
    pub owners_with_no_references: Vec<String>,
    /// Whether reference gathering finished before this snapshot was taken.
    ///
    /// When true, a resumed run reuses `owner_references` verbatim instead
    /// of re-listing every owner.
    pub references_complete: bool,
}

impl CheckpointSnapshot {
    /// True when the snapshot holds no restorable progress.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.owner_references.is_empty() && !self.references_complete
    }
}

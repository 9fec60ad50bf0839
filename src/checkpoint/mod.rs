//! Resumable-run persistence.
//!
//! A collection run periodically serializes its progress so an interrupted
//! run can pick up where it left off: already-fetched payloads become cache
//! hits on resume, and a completed reference-gathering pass is reused
//! instead of repeated. Writes are atomic (temp file plus rename) so a
//! crash mid-save never corrupts the previous checkpoint.

mod snapshot;
mod store;

pub use snapshot::CheckpointSnapshot;
pub use store::CheckpointStore;

//! Sync error types.

use crate::kv::KvError;
use crate::merge::MergeError;

/// Errors from a sync transport round-trip.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("Stored state is not a valid document: {0}")]
    CorruptState(String),
    #[error("Sync loop is not running")]
    Stopped,
}

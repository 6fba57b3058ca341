//! Read-modify-write of the shared document.
//!
//! Each merge fetches the current document, combines it with a patch, writes
//! the whole result back and advances the revision clock. There is no
//! compare-and-swap: two merges that read the same snapshot both succeed and
//! the later write wins for every field it replaced.

use std::sync::Arc;

use crate::kv::{KvError, KvStore};
use crate::models::StateDocument;

use super::clock::RevisionClock;
use super::patch::{ObjectField, Patch, PatchError, PatchOp, Replacement};

/// Default key holding the state document.
pub const DEFAULT_STATE_KEY: &str = "coralclub:state";
/// Default key holding the revision counter.
pub const DEFAULT_REV_KEY: &str = "coralclub:rev";

/// The two logical keys a deployment uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateKeys {
    pub state: String,
    pub rev: String,
}

impl StateKeys {
    pub fn new(state: impl Into<String>, rev: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            rev: rev.into(),
        }
    }
}

impl Default for StateKeys {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_KEY, DEFAULT_REV_KEY)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Rejected patch: {0}")]
    Patch(#[from] PatchError),
    #[error("Failed to read current state: {0}")]
    Fetch(#[source] KvError),
    #[error("Stored state is not a valid document: {0}")]
    CorruptState(#[source] serde_json::Error),
    #[error("Failed to encode state: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Failed to persist state: {0}")]
    Persist(#[source] KvError),
    #[error("State write was not acknowledged")]
    NotAcknowledged,
}

impl MergeError {
    /// HTTP status for this failure when reported by the proxy.
    pub fn http_status(&self) -> u16 {
        match self {
            MergeError::Patch(_) => 400,
            MergeError::Fetch(e) | MergeError::Persist(e) => e.http_status(),
            MergeError::CorruptState(_) | MergeError::Encode(_) => 500,
            MergeError::NotAcknowledged => 502,
        }
    }
}

/// Result of a committed merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The document as written.
    pub state: StateDocument,
    /// Clock value after the merge, or the locally computed revision when
    /// the clock could not be advanced.
    pub rev: u64,
    pub clock_advanced: bool,
}

/// Combines `patch` into `current` field by field. Does not touch `rev`.
pub fn apply_patch(current: &StateDocument, patch: &Patch) -> StateDocument {
    let mut next = current.clone();

    for op in patch.ops() {
        match op {
            PatchOp::Overlay { field, entries } => {
                let target = match field {
                    ObjectField::Brand => &mut next.brand,
                    ObjectField::Background => &mut next.background,
                    ObjectField::Layout => &mut next.layout,
                    ObjectField::Payments => &mut next.payments,
                    ObjectField::Security => &mut next.security,
                };
                for (k, v) in entries {
                    target.insert(k.clone(), v.clone());
                }
            }
            PatchOp::Replace(replacement) => match replacement {
                Replacement::Categories(v) => next.categories = v.clone(),
                Replacement::Tents(v) => next.tents = v.clone(),
                Replacement::Reservations(v) => next.reservations = v.clone(),
                Replacement::Logs(v) => next.logs = v.clone(),
            },
            PatchOp::Raw { key, value } => {
                next.extra.insert(key.clone(), value.clone());
            }
        }
    }

    next
}

/// `max(patch.rev, current_rev) + 1`.
pub fn next_revision(current_rev: u64, patch: &Patch) -> u64 {
    patch.rev().unwrap_or(0).max(current_rev).saturating_add(1)
}

/// Merge engine over any key-value store.
#[derive(Clone)]
pub struct MergeEngine {
    kv: Arc<dyn KvStore>,
    keys: StateKeys,
    clock: RevisionClock,
}

impl MergeEngine {
    pub fn new(kv: Arc<dyn KvStore>, keys: StateKeys) -> Self {
        let clock = RevisionClock::new(kv.clone(), keys.rev.clone());
        Self { kv, keys, clock }
    }

    pub fn keys(&self) -> &StateKeys {
        &self.keys
    }

    pub fn clock(&self) -> &RevisionClock {
        &self.clock
    }

    /// Loads the stored document. `None` when nothing has been written yet.
    pub async fn load(&self) -> Result<Option<StateDocument>, MergeError> {
        match self.kv.get(&self.keys.state).await.map_err(MergeError::Fetch)? {
            None => Ok(None),
            Some(value) if value.is_null() => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(MergeError::CorruptState),
        }
    }

    /// Writes a full document without merging.
    pub async fn store(&self, doc: &StateDocument) -> Result<(), MergeError> {
        let value = serde_json::to_value(doc).map_err(MergeError::Encode)?;
        let acknowledged = self
            .kv
            .set(&self.keys.state, &value)
            .await
            .map_err(MergeError::Persist)?;
        if acknowledged {
            Ok(())
        } else {
            Err(MergeError::NotAcknowledged)
        }
    }

    /// Writes the initial document and starts the clock at 1.
    pub async fn seed(&self, doc: &StateDocument) -> Result<u64, MergeError> {
        self.store(doc).await?;
        self.clock.reset(1).await.map_err(MergeError::Persist)?;
        tracing::info!("Seeded {} with {} tents", self.keys.state, doc.tents.len());
        Ok(1)
    }

    /// Merges `patch` into the stored document.
    ///
    /// A failed write fails the whole merge. A failed clock increment does
    /// not: the document is already written, so the outcome carries the
    /// locally computed revision instead.
    pub async fn merge(&self, patch: &Patch) -> Result<MergeOutcome, MergeError> {
        patch.validate()?;

        let current = self.load().await?.unwrap_or_default();
        let mut next = apply_patch(&current, patch);
        let next_rev = next_revision(current.rev, patch);
        next.rev = next_rev;

        self.store(&next).await?;

        let (rev, clock_advanced) = match self.clock.advance().await {
            Ok(rev) => (rev, true),
            Err(e) => {
                tracing::warn!(
                    "State written but {} not advanced ({}); using rev {}",
                    self.keys.rev,
                    e,
                    next_rev
                );
                (next_rev, false)
            }
        };

        tracing::debug!(
            "Merged {} field(s) into {} at rev {}",
            patch.ops().len(),
            self.keys.state,
            rev
        );

        Ok(MergeOutcome {
            state: next,
            rev,
            clock_advanced,
        })
    }
}

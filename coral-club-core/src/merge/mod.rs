//! State merge engine.
//!
//! Field rules:
//! - `brand`, `background`, `layout`, `payments`, `security`: shallow overlay;
//! - `categories`, `tents`, `reservations`, `logs`: replaced wholesale;
//! - anything else: copied verbatim.
//!
//! The merged document gets `rev = max(patch.rev, current.rev) + 1`.

mod clock;
mod engine;
mod patch;

pub use clock::RevisionClock;
pub use engine::{
    apply_patch, next_revision, MergeEngine, MergeError, MergeOutcome, StateKeys,
    DEFAULT_REV_KEY, DEFAULT_STATE_KEY,
};
pub use patch::{ObjectField, Patch, PatchError, PatchOp, Replacement};

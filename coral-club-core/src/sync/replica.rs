//! A client's local copy of the shared document.
//!
//! The replica polls the revision clock, replaces its copy wholesale when the
//! clock moves and pushes local edits through the transport. When a push
//! fails the edit is applied to the local copy only; the next successful poll
//! overwrites it with whatever the shared copy holds.
//!
//! Audit notes travel with an edit only when it already replaces `tents`,
//! `reservations` or `categories`. Those edits overwrite whole arrays from
//! the local snapshot anyway; object-only edits (brand, layout, payments,
//! security) never replace the shared log, so they cannot drop entries other
//! clients wrote since the last poll.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use super::error::SyncError;
use super::transport::SyncTransport;
use crate::lifecycle::sweep_expired;
use crate::merge::{apply_patch, Patch, PatchError};
use crate::models::{push_log, LogEntry, StateDocument, DEFAULT_TENT_COUNT};

/// Array fields whose replacement may carry an audit note.
const NOTE_CARRIERS: [&str; 3] = ["tents", "reservations", "categories"];

/// Poll interval used by the booking widget.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);
/// Expiry sweep interval.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    pub poll_interval: Duration,
    pub sweep_interval: Duration,
    /// Tent count of the document seeded into an empty store.
    pub seed_count: u32,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            seed_count: DEFAULT_TENT_COUNT,
        }
    }
}

/// How an edit landed.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Merged into the shared document.
    Remote { rev: u64 },
    /// The merge failed; only the local copy has the edit.
    Local { rev: u64, error: String },
}

impl Applied {
    pub fn rev(&self) -> u64 {
        match self {
            Applied::Remote { rev } | Applied::Local { rev, .. } => *rev,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Applied::Local { .. })
    }
}

#[derive(Debug)]
struct LocalState {
    doc: StateDocument,
    /// Revision of `doc`; runs ahead of `clock` after a local-only edit.
    rev: u64,
    /// Last value read from the revision clock or returned by a merge.
    clock: u64,
    /// Set while `doc` holds an edit the shared copy never received.
    local_only: bool,
    /// Bumped on every local replacement of `doc`.
    version: u64,
}

pub struct Replica<T: SyncTransport + ?Sized> {
    transport: Arc<T>,
    state: RwLock<LocalState>,
    config: ReplicaConfig,
}

impl<T: SyncTransport + ?Sized> Replica<T> {
    /// Starts from an unsynced seed copy at rev 0.
    pub fn new(transport: Arc<T>, config: ReplicaConfig) -> Self {
        let doc = StateDocument::seed(config.seed_count);
        Self {
            transport,
            state: RwLock::new(LocalState {
                doc,
                rev: 0,
                clock: 0,
                local_only: false,
                version: 0,
            }),
            config,
        }
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// A clone of the local copy.
    pub async fn snapshot(&self) -> StateDocument {
        self.state.read().await.doc.clone()
    }

    pub async fn rev(&self) -> u64 {
        self.state.read().await.rev
    }

    pub async fn version(&self) -> u64 {
        self.state.read().await.version
    }

    /// Loads the shared document, seeding the store if it is empty.
    pub async fn bootstrap(&self) -> Result<u64, SyncError> {
        let (doc, rev) = match self.transport.fetch_state().await? {
            Some(doc) => {
                let rev = match self.transport.fetch_revision().await? {
                    0 => 1,
                    rev => rev,
                };
                (doc, rev)
            }
            None => {
                let mut doc = StateDocument::seed(self.config.seed_count);
                doc.logs = push_log(&doc.logs, LogEntry::new("system", "Seed"));
                let rev = self.transport.seed(&doc).await?;
                tracing::info!("Seeded shared state with {} tents", doc.tents.len());
                (doc, rev)
            }
        };

        let mut state = self.state.write().await;
        state.doc = doc;
        state.rev = rev;
        state.clock = rev;
        state.local_only = false;
        state.version += 1;
        Ok(rev)
    }

    /// One poll tick. Returns whether the local copy was replaced.
    ///
    /// A local-only edit forces a fetch even when the clock has not moved.
    pub async fn poll_once(&self) -> Result<bool, SyncError> {
        let (seen_clock, local_only, seen_version) = {
            let state = self.state.read().await;
            (state.clock, state.local_only, state.version)
        };

        let rev = self.transport.fetch_revision().await?;
        if rev == seen_clock && !local_only {
            return Ok(false);
        }

        let Some(doc) = self.transport.fetch_state().await? else {
            tracing::debug!("Clock at {} but no document stored yet", rev);
            return Ok(false);
        };

        let mut state = self.state.write().await;
        if state.version != seen_version {
            tracing::debug!("Local edit during fetch; discarding rev {}", rev);
            return Ok(false);
        }
        state.doc = doc;
        state.rev = rev;
        state.clock = rev;
        state.local_only = false;
        state.version += 1;
        tracing::debug!("Adopted shared state at rev {}", rev);
        Ok(true)
    }

    /// Pushes `patch`, prepending `note` to the audit log when the patch
    /// replaces a note-carrying array and not `logs` itself.
    ///
    /// Only an invalid patch is an error. A failed merge falls back to a
    /// local-only apply and is reported as [`Applied::Local`].
    pub async fn apply(&self, patch: Patch, note: Option<LogEntry>) -> Result<Applied, PatchError> {
        patch.validate()?;

        let carries_note =
            !patch.touches("logs") && NOTE_CARRIERS.iter().any(|f| patch.touches(f));
        if let (Some(entry), false) = (&note, carries_note) {
            tracing::info!("[{}] {}", entry.kind, entry.message);
        }

        let current_logs = self.state.read().await.doc.logs.clone();
        let with_note = |kind_suffix: &str| match &note {
            Some(entry) if carries_note => {
                let mut entry = entry.clone();
                entry.kind.push_str(kind_suffix);
                patch.clone().logs(push_log(&current_logs, entry))
            }
            _ => patch.clone(),
        };

        let remote = with_note("");
        match self.transport.merge(&remote).await {
            Ok(outcome) => {
                let mut state = self.state.write().await;
                state.doc = outcome.state;
                state.rev = outcome.rev;
                state.clock = outcome.rev;
                state.local_only = false;
                state.version += 1;
                Ok(Applied::Remote { rev: outcome.rev })
            }
            Err(e) => {
                let local = with_note(" (local)");
                let mut state = self.state.write().await;
                let mut doc = apply_patch(&state.doc, &local);
                state.rev += 1;
                doc.rev = state.rev;
                state.doc = doc;
                state.local_only = true;
                state.version += 1;
                tracing::warn!("Merge failed, applied locally at rev {}: {}", state.rev, e);
                Ok(Applied::Local {
                    rev: state.rev,
                    error: e.to_string(),
                })
            }
        }
    }

    /// One expiry sweep over the local copy. `None` when nothing expired.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<Option<Applied>, PatchError> {
        let doc = self.snapshot().await;
        match sweep_expired(&doc, now) {
            Some(transition) => {
                tracing::info!("{}", transition.note.message);
                Ok(Some(self.apply(transition.patch, Some(transition.note)).await?))
            }
            None => Ok(None),
        }
    }
}

impl<T: SyncTransport + ?Sized + 'static> Replica<T> {
    /// Runs the poll and sweep timers until `shutdown` flips to `true`.
    ///
    /// Tick failures are logged and the loop carries on.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut poll = tokio::time::interval(self.config.poll_interval);
        let mut sweep = tokio::time::interval(self.config.sweep_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::warn!("Poll failed: {}", e);
                    }
                }
                _ = sweep.tick() => {
                    if let Err(e) = self.sweep_once(Utc::now()).await {
                        tracing::warn!("Sweep failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Sync loop stopped");
    }

    /// Spawns [`Replica::run`] on the current runtime.
    pub fn spawn(self: &Arc<Self>) -> SyncHandle {
        let (tx, rx) = watch::channel(false);
        let replica = Arc::clone(self);
        let task = tokio::spawn(async move { replica.run(rx).await });
        SyncHandle { shutdown: tx, task }
    }
}

/// Handle to a spawned sync loop.
pub struct SyncHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Stops the loop and waits for the current tick to finish.
    pub async fn shutdown(self) -> Result<(), SyncError> {
        self.shutdown.send(true).map_err(|_| SyncError::Stopped)?;
        self.task.await.map_err(|_| SyncError::Stopped)
    }
}

//! How a replica talks to the shared state.
//!
//! The replica only needs four calls. Polling the revision clock is one way
//! to satisfy them; a push channel could implement the same trait.

use std::sync::Arc;

use async_trait::async_trait;
use super::error::SyncError;
use crate::kv::{KvStore, ProxyKvClient};
use crate::merge::{MergeEngine, MergeError, MergeOutcome, Patch, RevisionClock, StateKeys};
use crate::models::StateDocument;

#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Current value of the revision clock.
    async fn fetch_revision(&self) -> Result<u64, SyncError>;

    /// The whole shared document, `None` when none was ever written.
    async fn fetch_state(&self) -> Result<Option<StateDocument>, SyncError>;

    /// Writes the initial document. Returns the starting revision.
    async fn seed(&self, doc: &StateDocument) -> Result<u64, SyncError>;

    /// Runs a merge against the shared document.
    async fn merge(&self, patch: &Patch) -> Result<MergeOutcome, SyncError>;
}

/// Merges in-process, straight against a key-value store.
#[async_trait]
impl SyncTransport for MergeEngine {
    async fn fetch_revision(&self) -> Result<u64, SyncError> {
        Ok(self.clock().current().await?)
    }

    async fn fetch_state(&self) -> Result<Option<StateDocument>, SyncError> {
        Ok(self.load().await?)
    }

    async fn seed(&self, doc: &StateDocument) -> Result<u64, SyncError> {
        Ok(MergeEngine::seed(self, doc).await?)
    }

    async fn merge(&self, patch: &Patch) -> Result<MergeOutcome, SyncError> {
        Ok(MergeEngine::merge(self, patch).await?)
    }
}

/// Talks to `coralclub-server` over its proxy endpoints.
#[derive(Clone)]
pub struct ProxyTransport {
    client: Arc<ProxyKvClient>,
    keys: StateKeys,
    clock: RevisionClock,
}

impl ProxyTransport {
    pub fn new(client: ProxyKvClient, keys: StateKeys) -> Self {
        let client = Arc::new(client);
        let clock = RevisionClock::new(client.clone(), keys.rev.clone());
        Self {
            client,
            keys,
            clock,
        }
    }

    pub fn keys(&self) -> &StateKeys {
        &self.keys
    }
}

#[async_trait]
impl SyncTransport for ProxyTransport {
    async fn fetch_revision(&self) -> Result<u64, SyncError> {
        Ok(self.clock.current().await?)
    }

    async fn fetch_state(&self) -> Result<Option<StateDocument>, SyncError> {
        match self.client.get(&self.keys.state).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| SyncError::CorruptState(e.to_string())),
        }
    }

    async fn seed(&self, doc: &StateDocument) -> Result<u64, SyncError> {
        let value = serde_json::to_value(doc).map_err(MergeError::Encode)?;
        if !self.client.set(&self.keys.state, &value).await? {
            return Err(MergeError::NotAcknowledged.into());
        }
        self.clock.reset(1).await?;
        Ok(1)
    }

    async fn merge(&self, patch: &Patch) -> Result<MergeOutcome, SyncError> {
        let response = self
            .client
            .merge(&self.keys.state, patch.to_value(), &self.keys.rev)
            .await?;
        Ok(MergeOutcome {
            state: response.state,
            rev: response.rev,
            // The proxy answer does not say whether its clock moved.
            clock_advanced: true,
        })
    }
}

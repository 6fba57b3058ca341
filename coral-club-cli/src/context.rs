//! Connection to the shared state for a single CLI invocation.

use std::sync::Arc;

use coral_club_core::kv::ProxyKvClient;
use coral_club_core::sync::{ProxyTransport, Replica, SyncError};

use crate::config::Config;

pub type ProxyReplica = Replica<ProxyTransport>;

/// Builds a replica against the configured server and loads the document,
/// seeding it when the store is empty.
pub async fn connect(config: &Config) -> Result<Arc<ProxyReplica>, SyncError> {
    let client = ProxyKvClient::new(config.server_url.value.clone());
    let transport = Arc::new(ProxyTransport::new(client, config.state_keys()));
    let replica = Arc::new(Replica::new(transport, config.replica_config()));

    let rev = replica.bootstrap().await?;
    tracing::debug!(
        "Connected to {} at rev {}",
        config.server_url.value,
        rev
    );
    Ok(replica)
}

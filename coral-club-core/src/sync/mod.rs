//! Client-side synchronisation with the shared document.
//!
//! A [`Replica`] keeps a local copy fresh by polling the revision clock and
//! pushes edits through a [`SyncTransport`]. Two transports exist: the HTTP
//! proxy and an in-process [`MergeEngine`](crate::merge::MergeEngine).

mod error;
mod replica;
mod transport;

pub use error::SyncError;
pub use replica::{
    Applied, Replica, ReplicaConfig, SyncHandle, DEFAULT_POLL_INTERVAL, DEFAULT_SWEEP_INTERVAL,
};
pub use transport::{ProxyTransport, SyncTransport};

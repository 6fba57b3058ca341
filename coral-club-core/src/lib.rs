//! Coral Club Core Library
//!
//! Shared booking state for Coral Club: the state document, key-value
//! clients, the merge engine, reservation lifecycle and the client sync loop.

pub mod admin;
pub mod kv;
pub mod lifecycle;
pub mod merge;
pub mod models;
pub mod protocol;
pub mod sync;

pub use admin::{verify_pin, AdminError, AdminSession};
pub use kv::{KvError, KvStore, MemoryKv, ProxyKvClient, RestKvClient};
pub use lifecycle::{LifecycleError, ReservationManager, Transition};
pub use merge::{
    apply_patch, MergeEngine, MergeError, MergeOutcome, Patch, PatchError, RevisionClock,
    StateKeys,
};
pub use models::{
    Cart, CartLine, Category, Customer, Item, LogEntry, Reservation, ReservationStatus,
    StateDocument, Tent, TentState,
};
pub use sync::{Applied, ProxyTransport, Replica, ReplicaConfig, SyncError, SyncTransport};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}

//! Peer registry implementation
//!
//! The single source of truth for who is connected.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::entry::{PeerEntry, PeerId};
use super::error::RegistryError;

/// A peer removed from the registry
#[derive(Debug)]
pub struct Unregistered {
    /// The removed entry
    pub entry: Arc<PeerEntry>,
    /// Registry size right after the removal
    pub remaining: usize,
}

/// Set of live peers keyed by identity
///
/// Thread-safe via `RwLock`. Iteration always works on a snapshot taken
/// under the read lock, so visitors run without holding it and concurrent
/// removals cannot corrupt or repeat an iteration.
pub struct PeerRegistry {
    peers: RwLock<HashMap<PeerId, Arc<PeerEntry>>>,
}

impl PeerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a peer
    ///
    /// Returns the registry size after insertion.
    pub async fn register(&self, entry: Arc<PeerEntry>) -> Result<usize, RegistryError> {
        let mut peers = self.peers.write().await;

        let id = entry.id();
        if peers.contains_key(&id) {
            return Err(RegistryError::DuplicateIdentity(id));
        }

        peers.insert(id, entry);
        let size = peers.len();

        tracing::debug!(peer = %id, peers = size, "Peer registered");
        Ok(size)
    }

    /// Remove a peer
    ///
    /// Idempotent: removing an absent peer returns `None`, which is how
    /// racing close/error/eviction paths find out someone else got there first.
    pub async fn unregister(&self, id: PeerId) -> Option<Unregistered> {
        let mut peers = self.peers.write().await;

        let entry = peers.remove(&id)?;
        let remaining = peers.len();

        tracing::debug!(peer = %id, peers = remaining, "Peer unregistered");
        Some(Unregistered { entry, remaining })
    }

    /// Look up a peer
    pub async fn get(&self, id: PeerId) -> Option<Arc<PeerEntry>> {
        self.peers.read().await.get(&id).cloned()
    }

    /// Check whether a peer is registered
    pub async fn contains(&self, id: PeerId) -> bool {
        self.peers.read().await.contains_key(&id)
    }

    /// Current peer count
    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    /// Snapshot of the current peers, in no particular order
    pub async fn snapshot(&self) -> Vec<Arc<PeerEntry>> {
        self.peers.read().await.values().cloned().collect()
    }

    /// Apply `visitor` to every peer in a snapshot
    pub async fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&Arc<PeerEntry>),
    {
        for entry in self.snapshot().await.iter() {
            visitor(entry);
        }
    }

    /// Remove every peer at once
    ///
    /// Used on shutdown; no viewer count is broadcast for these removals.
    pub async fn drain(&self) -> Vec<Arc<PeerEntry>> {
        let mut peers = self.peers.write().await;
        peers.drain().map(|(_, entry)| entry).collect()
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

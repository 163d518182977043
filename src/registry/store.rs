//! Viewer registry implementation
//!
//! The registry is the sole owner of the set of live viewers. Other
//! components only add, remove and broadcast.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::RwLock;

use super::config::RegistryConfig;
use super::entry::{BroadcastOutcome, ViewerEntry, ViewerInfo, ViewerSubscription};
use super::frame::ViewerId;
use crate::error::ConnectionFault;

/// Registry of connected viewers
///
/// Thread-safe via `RwLock`. Broadcasts only need read access, so they run
/// concurrently with each other and are serialized against add/remove.
pub struct ViewerRegistry {
    /// Map of viewer id to entry
    viewers: RwLock<HashMap<ViewerId, ViewerEntry>>,

    next_id: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl ViewerRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            viewers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a viewer
    ///
    /// Returns the viewer's id and the queue its writer task must drain.
    pub async fn add(&self, peer_addr: SocketAddr) -> ViewerSubscription {
        let id = ViewerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (entry, chunks) = ViewerEntry::new(peer_addr, self.config.viewer_queue_capacity);

        let mut viewers = self.viewers.write().await;
        viewers.insert(id, entry);

        tracing::info!(
            viewer_id = %id,
            peer = %peer_addr,
            viewers = viewers.len(),
            "Viewer added"
        );

        ViewerSubscription { id, chunks }
    }

    /// Remove a viewer
    ///
    /// Idempotent: returns `false` if the viewer was already gone. Dropping
    /// the entry closes the viewer's queue, which ends its writer task.
    pub async fn remove(&self, id: ViewerId) -> bool {
        let mut viewers = self.viewers.write().await;

        match viewers.remove(&id) {
            Some(entry) => {
                tracing::info!(
                    viewer_id = %id,
                    peer = %entry.peer_addr,
                    viewers = viewers.len(),
                    "Viewer removed"
                );
                true
            }
            None => false,
        }
    }

    /// Offer a chunk to every registered viewer
    ///
    /// Each viewer either queues the whole chunk or is evicted; a failing
    /// viewer never affects delivery to the others.
    pub async fn broadcast(&self, chunk: Bytes) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();

        {
            let viewers = self.viewers.read().await;
            for (id, entry) in viewers.iter() {
                // Bytes clone is a refcount bump
                match entry.offer(chunk.clone()) {
                    Ok(()) => outcome.delivered += 1,
                    Err(fault) => outcome.evicted.push((*id, fault)),
                }
            }
        }

        if !outcome.evicted.is_empty() {
            let mut viewers = self.viewers.write().await;
            for (id, fault) in &outcome.evicted {
                if let Some(entry) = viewers.remove(id) {
                    match fault {
                        ConnectionFault::QueueOverflow => tracing::warn!(
                            viewer_id = %id,
                            peer = %entry.peer_addr,
                            "Viewer too slow, evicted"
                        ),
                        _ => tracing::debug!(
                            viewer_id = %id,
                            peer = %entry.peer_addr,
                            reason = %fault,
                            "Viewer gone, removed"
                        ),
                    }
                }
            }
        }

        outcome
    }

    /// Number of registered viewers
    pub async fn viewer_count(&self) -> usize {
        self.viewers.read().await.len()
    }

    /// Check whether a viewer is registered
    pub async fn contains(&self, id: ViewerId) -> bool {
        self.viewers.read().await.contains_key(&id)
    }

    /// Snapshot of all registered viewers
    pub async fn viewers(&self) -> Vec<ViewerInfo> {
        let viewers = self.viewers.read().await;
        let mut list: Vec<ViewerInfo> = viewers
            .iter()
            .map(|(id, entry)| ViewerInfo {
                id: *id,
                peer_addr: entry.peer_addr,
                connected_at: entry.connected_at,
                queued: entry.queued(),
            })
            .collect();
        list.sort_by_key(|v| v.id);
        list
    }

    /// Remove every viewer, returning how many were registered
    ///
    /// Writer tasks flush what is already queued and then close their
    /// transports.
    pub async fn clear(&self) -> usize {
        let mut viewers = self.viewers.write().await;
        let count = viewers.len();
        viewers.clear();
        count
    }
}

impl Default for ViewerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

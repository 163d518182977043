//! Viewer entry types
//!
//! This module defines the per-viewer state stored in the registry.

use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::ConnectionFault;

use super::frame::ViewerId;

/// Entry for a single viewer in the registry
///
/// The entry holds the sending half of the viewer's bounded chunk queue. The
/// receiving half belongs to the viewer's writer task, which is the only
/// code that ever writes to the viewer's transport.
pub struct ViewerEntry {
    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// When the viewer was registered
    pub connected_at: Instant,

    /// Queue capacity, kept for depth reporting
    capacity: usize,

    tx: mpsc::Sender<Bytes>,
}

impl ViewerEntry {
    /// Create a new entry and the queue receiver for its writer task
    pub(super) fn new(peer_addr: SocketAddr, capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);

        let entry = Self {
            peer_addr,
            connected_at: Instant::now(),
            capacity,
            tx,
        };

        (entry, rx)
    }

    /// Enqueue a chunk without waiting
    ///
    /// The chunk is either queued whole or not at all.
    pub(super) fn offer(&self, chunk: Bytes) -> Result<(), ConnectionFault> {
        self.tx.try_send(chunk).map_err(|e| match e {
            TrySendError::Full(_) => ConnectionFault::QueueOverflow,
            TrySendError::Closed(_) => ConnectionFault::Closed,
        })
    }

    /// Number of chunks waiting to be written
    pub fn queued(&self) -> usize {
        self.capacity - self.tx.capacity()
    }
}

/// Snapshot of one registered viewer
#[derive(Debug, Clone)]
pub struct ViewerInfo {
    /// Viewer identity
    pub id: ViewerId,
    /// Remote peer address
    pub peer_addr: SocketAddr,
    /// When the viewer was registered
    pub connected_at: Instant,
    /// Chunks waiting in the viewer's queue
    pub queued: usize,
}

/// A registered viewer's side of the registry
///
/// Returned by [`ViewerRegistry::add`](super::ViewerRegistry::add). The
/// holder drains `chunks` and writes each one to the transport.
#[derive(Debug)]
pub struct ViewerSubscription {
    /// Identity to pass to `remove`
    pub id: ViewerId,
    /// Chunks to deliver, in broadcast order
    pub chunks: mpsc::Receiver<Bytes>,
}

/// Result of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Viewers that accepted the chunk
    pub delivered: usize,
    /// Viewers removed during this broadcast
    pub evicted: Vec<(ViewerId, ConnectionFault)>,
}

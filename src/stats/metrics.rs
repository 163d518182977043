//! Statistics for the broadcast pipeline

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Pipeline counters, updated lock-free from the broadcaster and viewer tasks
#[derive(Debug)]
pub struct BroadcastStats {
    started_at: Instant,
    chunks_read: AtomicU64,
    bytes_read: AtomicU64,
    chunks_delivered: AtomicU64,
    viewers_connected: AtomicU64,
    viewers_total: AtomicU64,
    viewers_evicted: AtomicU64,
    handshake_failures: AtomicU64,
}

impl BroadcastStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            chunks_read: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            chunks_delivered: AtomicU64::new(0),
            viewers_connected: AtomicU64::new(0),
            viewers_total: AtomicU64::new(0),
            viewers_evicted: AtomicU64::new(0),
            handshake_failures: AtomicU64::new(0),
        }
    }

    /// Record one chunk read from the transcoder and its fan-out result
    pub fn on_chunk(&self, len: usize, delivered: usize, evicted: usize) {
        self.chunks_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(len as u64, Ordering::Relaxed);
        self.chunks_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.viewers_evicted
            .fetch_add(evicted as u64, Ordering::Relaxed);
    }

    pub fn on_viewer_connected(&self) {
        self.viewers_connected.fetch_add(1, Ordering::Relaxed);
        self.viewers_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_viewer_disconnected(&self) {
        // Saturating: a disconnect is never counted without a connect
        let _ = self
            .viewers_connected
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    pub fn on_handshake_failure(&self) {
        self.handshake_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters into a plain snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            chunks_read: self.chunks_read.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            chunks_delivered: self.chunks_delivered.load(Ordering::Relaxed),
            viewers_connected: self.viewers_connected.load(Ordering::Relaxed),
            viewers_total: self.viewers_total.load(Ordering::Relaxed),
            viewers_evicted: self.viewers_evicted.load(Ordering::Relaxed),
            handshake_failures: self.handshake_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for BroadcastStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`BroadcastStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub uptime: Duration,
    /// Chunks read from the transcoder
    pub chunks_read: u64,
    /// Encoded bytes read from the transcoder
    pub bytes_read: u64,
    /// Chunk deliveries summed over all viewers
    pub chunks_delivered: u64,
    /// Viewers currently connected
    pub viewers_connected: u64,
    /// Viewers ever connected
    pub viewers_total: u64,
    /// Viewers removed by the broadcaster
    pub viewers_evicted: u64,
    /// Transports that never completed the handshake
    pub handshake_failures: u64,
}

impl StatsSnapshot {
    /// Encoded output bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_read * 8) / secs
        } else {
            0
        }
    }
}

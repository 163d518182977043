//! Frame broadcaster
//!
//! Reads the encoded stream from the transcoder in fixed quanta and offers
//! every chunk, unmodified, to all registered viewers. The loop ends when
//! the transcoder's output reaches end of stream, which only happens once
//! the process has exited. Its end is the orchestrator's cue to shut down
//! the rest of the system.

use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::registry::ViewerRegistry;
use crate::stats::BroadcastStats;
use crate::transcode::EncodedOutput;

/// Fan-out loop from one encoded stream to all viewers
pub struct Broadcaster<R> {
    output: EncodedOutput<R>,
    registry: Arc<ViewerRegistry>,
    stats: Arc<BroadcastStats>,
}

impl<R> Broadcaster<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(
        output: EncodedOutput<R>,
        registry: Arc<ViewerRegistry>,
        stats: Arc<BroadcastStats>,
    ) -> Self {
        Self {
            output,
            registry,
            stats,
        }
    }

    /// Run until the encoded stream ends
    ///
    /// Returns the number of chunks broadcast. A read error on the encoded
    /// stream ends the loop with that error.
    pub async fn run(mut self) -> Result<u64> {
        tracing::info!(quantum = self.output.quantum(), "Broadcast loop started");
        let mut chunks = 0u64;

        loop {
            match self.output.read_chunk().await {
                Ok(Some(chunk)) => {
                    let len = chunk.len();
                    let outcome = self.registry.broadcast(chunk).await;
                    self.stats
                        .on_chunk(len, outcome.delivered, outcome.evicted.len());
                    chunks += 1;

                    tracing::trace!(
                        len = len,
                        delivered = outcome.delivered,
                        evicted = outcome.evicted.len(),
                        "Chunk broadcast"
                    );
                }
                Ok(None) => {
                    tracing::info!(chunks = chunks, "Encoded stream ended, broadcast loop finished");
                    return Ok(chunks);
                }
                Err(e) => {
                    tracing::error!(error = %e, chunks = chunks, "Failed to read encoded stream");
                    return Err(e.into());
                }
            }
        }
    }

    /// Run on its own task
    pub fn spawn(self) -> JoinHandle<Result<u64>> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use bytes::Bytes;
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::registry::RegistryConfig;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn chunk(i: u8) -> Vec<u8> {
        vec![i; 8]
    }

    #[tokio::test]
    async fn test_all_viewers_receive_all_chunks() {
        let registry = Arc::new(ViewerRegistry::new());
        let stats = Arc::new(BroadcastStats::new());
        let mut subs = Vec::new();
        for _ in 0..3 {
            subs.push(registry.add(peer()).await);
        }

        let data: Vec<u8> = (0..10u8).flat_map(chunk).collect();
        let output = EncodedOutput::new(std::io::Cursor::new(data), 8);

        let count = Broadcaster::new(output, Arc::clone(&registry), Arc::clone(&stats))
            .run()
            .await
            .unwrap();
        assert_eq!(count, 10);

        for sub in subs.iter_mut() {
            for i in 0..10u8 {
                assert_eq!(sub.chunks.recv().await.unwrap(), Bytes::from(chunk(i)));
            }
        }

        let snap = stats.snapshot();
        assert_eq!(snap.chunks_read, 10);
        assert_eq!(snap.bytes_read, 80);
        assert_eq!(snap.chunks_delivered, 30);
    }

    #[tokio::test]
    async fn test_viewer_leaving_mid_stream() {
        let registry = Arc::new(ViewerRegistry::with_config(
            RegistryConfig::default().viewer_queue_capacity(64),
        ));
        let stats = Arc::new(BroadcastStats::new());
        let mut first = registry.add(peer()).await;
        let leaving = registry.add(peer()).await;
        let mut last = registry.add(peer()).await;

        let (mut producer, consumer) = tokio::io::duplex(1024);
        let handle = Broadcaster::new(
            EncodedOutput::new(consumer, 8),
            Arc::clone(&registry),
            Arc::clone(&stats),
        )
        .spawn();

        for i in 0..5u8 {
            producer.write_all(&chunk(i)).await.unwrap();
        }
        for i in 0..5u8 {
            assert_eq!(first.chunks.recv().await.unwrap()[0], i);
        }

        let leaving_id = leaving.id;
        drop(leaving);

        for i in 5..10u8 {
            producer.write_all(&chunk(i)).await.unwrap();
        }
        drop(producer);

        assert_eq!(handle.await.unwrap().unwrap(), 10);
        assert!(!registry.contains(leaving_id).await);

        for i in 5..10u8 {
            assert_eq!(first.chunks.recv().await.unwrap()[0], i);
        }
        for i in 0..10u8 {
            assert_eq!(last.chunks.recv().await.unwrap()[0], i);
        }
        assert_eq!(stats.snapshot().viewers_evicted, 1);
    }

    #[tokio::test]
    async fn test_no_viewers() {
        let registry = Arc::new(ViewerRegistry::new());
        let output = EncodedOutput::new(&b"0123456789"[..], 4);

        let count = Broadcaster::new(output, registry, Arc::new(BroadcastStats::new()))
            .run()
            .await
            .unwrap();

        assert_eq!(count, 3);
    }
}

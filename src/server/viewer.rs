//! Per-viewer connection task
//!
//! Lifecycle of one viewer:
//!
//! ```text
//! accept ──► handshake + header ──► registry.add ──► write loop ──► registry.remove
//!               │ fails                                 │ queue closed / peer gone
//!               ▼                                       ▼
//!            dropped, never registered               close
//! ```
//!
//! The write loop is the only writer to the socket. It drains the viewer's
//! queue in order and sends each chunk as one binary message. Once the
//! server stops it flushes whatever is still queued and closes, even if the
//! viewer registered after the registry was cleared.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{ConnectionFault, Error, Result};
use crate::protocol::{accept_viewer, StreamHeader};
use crate::registry::ViewerRegistry;
use crate::stats::BroadcastStats;

/// Everything a viewer task needs
pub(crate) struct ViewerContext {
    pub peer_addr: SocketAddr,
    pub header: StreamHeader,
    pub registry: Arc<ViewerRegistry>,
    pub stats: Arc<BroadcastStats>,
    pub shutdown: watch::Receiver<bool>,
}

/// Handshake, register and stream to one viewer until it goes away
pub(crate) async fn serve_viewer<S>(socket: S, mut ctx: ViewerContext) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let ws = tokio::select! {
        result = accept_viewer(socket, &ctx.header) => match result {
            Ok(ws) => ws,
            Err(e) => {
                ctx.stats.on_handshake_failure();
                return Err(e.into());
            }
        },
        _ = stopping(&mut ctx.shutdown) => {
            tracing::debug!(peer = %ctx.peer_addr, "Shutdown during handshake");
            return Ok(());
        }
    };

    let mut subscription = ctx.registry.add(ctx.peer_addr).await;
    let viewer_id = subscription.id;
    ctx.stats.on_viewer_connected();

    let (mut ws_tx, mut ws_rx) = ws.split();

    let result: Result<()> = loop {
        tokio::select! {
            chunk = subscription.chunks.recv() => match chunk {
                Some(chunk) => {
                    if let Err(e) = ws_tx.send(Message::Binary(chunk)).await {
                        break Err(ConnectionFault::Transport(e.to_string()).into());
                    }
                }
                None => {
                    // Removed from the registry: evicted or shutting down
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break Ok(());
                }
            },
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break Err(ConnectionFault::Closed.into()),
                Some(Err(e)) => break Err(ConnectionFault::Transport(e.to_string()).into()),
                Some(Ok(_)) => {} // Viewers have nothing to say
            },
            _ = stopping(&mut ctx.shutdown) => {
                // Registration may have raced the registry being cleared
                ctx.registry.remove(viewer_id).await;
                subscription.chunks.close();
                let mut flushed = Ok(());
                while let Some(chunk) = subscription.chunks.recv().await {
                    if let Err(e) = ws_tx.send(Message::Binary(chunk)).await {
                        flushed = Err(ConnectionFault::Transport(e.to_string()).into());
                        break;
                    }
                }
                if flushed.is_ok() {
                    let _ = ws_tx.send(Message::Close(None)).await;
                }
                break flushed;
            }
        }
    };

    ctx.registry.remove(viewer_id).await;
    ctx.stats.on_viewer_disconnected();

    match result {
        Err(Error::Connection(ConnectionFault::Closed)) => {
            tracing::debug!(viewer_id = %viewer_id, "Viewer closed the connection");
            Ok(())
        }
        other => other,
    }
}

/// Resolves once the server is stopping or has gone away
async fn stopping(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    struct Fixture {
        registry: Arc<ViewerRegistry>,
        stats: Arc<BroadcastStats>,
        stop_tx: watch::Sender<bool>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: Arc::new(ViewerRegistry::new()),
                stats: Arc::new(BroadcastStats::new()),
                stop_tx: watch::channel(false).0,
            }
        }

        fn context(&self) -> ViewerContext {
            ViewerContext {
                peer_addr: "127.0.0.1:50000".parse().unwrap(),
                header: StreamHeader::new(640, 480),
                registry: Arc::clone(&self.registry),
                stats: Arc::clone(&self.stats),
                shutdown: self.stop_tx.subscribe(),
            }
        }
    }

    async fn wait_for_viewers(registry: &ViewerRegistry, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.viewer_count().await != count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_streams_until_removed() {
        let fixture = Fixture::new();
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(serve_viewer(server_io, fixture.context()));

        let (mut client, _) = tokio_tungstenite::client_async("ws://localhost/", client_io)
            .await
            .unwrap();
        assert!(matches!(client.next().await, Some(Ok(Message::Binary(_)))));
        wait_for_viewers(&fixture.registry, 1).await;

        fixture.registry.broadcast(bytes::Bytes::from_static(b"abc")).await;
        fixture.registry.clear().await;

        match client.next().await {
            Some(Ok(Message::Binary(data))) => assert_eq!(&data[..], b"abc"),
            other => panic!("expected data, got {:?}", other),
        }
        assert!(matches!(client.next().await, Some(Ok(Message::Close(_)))));
        task.await.unwrap().unwrap();
        assert_eq!(fixture.stats.snapshot().viewers_connected, 0);
    }

    #[tokio::test]
    async fn test_stop_ends_viewer_missed_by_clear() {
        let fixture = Fixture::new();
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(serve_viewer(server_io, fixture.context()));

        let (mut client, _) = tokio_tungstenite::client_async("ws://localhost/", client_io)
            .await
            .unwrap();
        assert!(matches!(client.next().await, Some(Ok(Message::Binary(_)))));
        wait_for_viewers(&fixture.registry, 1).await;

        // Registered after the server cleared the registry: only the stop
        // signal can end it
        fixture.registry.broadcast(bytes::Bytes::from_static(b"tail")).await;
        fixture.stop_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(fixture.registry.viewer_count().await, 0);

        match client.next().await {
            Some(Ok(Message::Binary(data))) => assert_eq!(&data[..], b"tail"),
            other => panic!("expected queued data, got {:?}", other),
        }
        assert!(matches!(client.next().await, Some(Ok(Message::Close(_)))));
    }

    #[tokio::test]
    async fn test_stop_during_handshake() {
        let fixture = Fixture::new();
        let (server_io, _client_io) = tokio::io::duplex(1024);
        let task = tokio::spawn(serve_viewer(server_io, fixture.context()));

        fixture.stop_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(fixture.registry.viewer_count().await, 0);
        assert_eq!(fixture.stats.snapshot().viewers_total, 0);
    }
}

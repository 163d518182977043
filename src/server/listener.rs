//! Video stream server listener
//!
//! Handles the TCP accept loop and spawns one task per viewer.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::error::Result;
use crate::protocol::StreamHeader;
use crate::registry::ViewerRegistry;
use crate::server::config::StreamServerConfig;
use crate::server::viewer::{serve_viewer, ViewerContext};
use crate::stats::BroadcastStats;

/// Video stream server
pub struct StreamServer {
    config: StreamServerConfig,
    listener: TcpListener,
    header: StreamHeader,
    registry: Arc<ViewerRegistry>,
    stats: Arc<BroadcastStats>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl StreamServer {
    /// Bind the listening socket
    ///
    /// Every viewer that connects receives `header` as its first message.
    pub async fn bind(
        config: StreamServerConfig,
        header: StreamHeader,
        registry: Arc<ViewerRegistry>,
        stats: Arc<BroadcastStats>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Ok(Self {
            config,
            listener,
            header,
            registry,
            stats,
            connection_semaphore,
        })
    }

    /// Address the server is actually listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Get a reference to the viewer registry
    pub fn registry(&self) -> &Arc<ViewerRegistry> {
        &self.registry
    }

    /// Serve viewers until `shutdown` resolves
    ///
    /// On shutdown the listener stops accepting, every viewer is removed from
    /// the registry and all viewer tasks are joined before returning.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = %self.local_addr()?, "Stream server listening");

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut viewers = JoinSet::new();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Stream server shutting down");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(socket, peer_addr, &stop_rx, &mut viewers);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },
                Some(_) = viewers.join_next(), if !viewers.is_empty() => {}
            }
        }

        drop(self.listener);
        let _ = stop_tx.send(true);
        let cleared = self.registry.clear().await;

        let mut joined = 0usize;
        while viewers.join_next().await.is_some() {
            joined += 1;
        }

        tracing::info!(
            viewers = cleared,
            tasks = joined,
            "Stream server stopped"
        );
        Ok(())
    }

    fn handle_connection(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        stop_rx: &watch::Receiver<bool>,
        viewers: &mut JoinSet<()>,
    ) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        tracing::debug!(peer = %peer_addr, "New connection");

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let ctx = ViewerContext {
            peer_addr,
            header: self.header,
            registry: Arc::clone(&self.registry),
            stats: Arc::clone(&self.stats),
            shutdown: stop_rx.clone(),
        };

        viewers.spawn(async move {
            // Held for the lifetime of the viewer
            let _permit = permit;

            if let Err(e) = serve_viewer(socket, ctx).await {
                tracing::debug!(peer = %peer_addr, error = %e, "Viewer connection error");
            }

            tracing::debug!(peer = %peer_addr, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}

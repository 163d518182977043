//! Video stream server
//!
//! Accepts WebSocket viewers on the stream port. Each viewer gets the stream
//! header first and then every encoded chunk broadcast after it registered.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use robocast::protocol::StreamHeader;
//! use robocast::registry::ViewerRegistry;
//! use robocast::server::{StreamServer, StreamServerConfig};
//! use robocast::stats::BroadcastStats;
//!
//! #[tokio::main]
//! async fn main() -> robocast::Result<()> {
//!     let server = StreamServer::bind(
//!         StreamServerConfig::default(),
//!         StreamHeader::new(640, 480),
//!         Arc::new(ViewerRegistry::new()),
//!         Arc::new(BroadcastStats::new()),
//!     )
//!     .await?;
//!
//!     server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! }
//! ```

pub mod config;
pub mod listener;
mod viewer;

pub use config::{StreamServerConfig, DEFAULT_READ_QUANTUM, DEFAULT_STREAM_PORT};
pub use listener::StreamServer;

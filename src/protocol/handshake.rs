//! Viewer handshake
//!
//! A viewer transport goes through two steps before it may be registered:
//!
//! ```text
//! Viewer                                   Server
//!   |                                        |
//!   |------- HTTP GET (Upgrade) ----------->|
//!   |<------ 101 Switching Protocols -------|
//!   |                                        |
//!   |<------ binary: StreamHeader (8) ------|
//!   |                                        |
//!   |          [ready for registry]          |
//! ```
//!
//! If either step fails the transport is dropped and never registered.

use futures_util::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::HandshakeError;

use super::header::StreamHeader;

/// Upgrade a transport to WebSocket and announce the stream geometry
pub async fn accept_viewer<S>(
    stream: S,
    header: &StreamHeader,
) -> Result<WebSocketStream<S>, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut ws = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| HandshakeError::Upgrade(e.to_string()))?;

    ws.send(Message::Binary(header.encode()))
        .await
        .map_err(|e| HandshakeError::Header(e.to_string()))?;

    Ok(ws)
}

//! Video stream protocol
//!
//! This module provides:
//! - The 8-byte stream header announcing geometry
//! - The viewer handshake (WebSocket upgrade followed by the header)
//!
//! After the header, everything on the connection is the raw encoded
//! elementary stream. Chunk boundaries carry no meaning.

pub mod handshake;
pub mod header;

pub use handshake::accept_viewer;
pub use header::{StreamHeader, HEADER_LEN, STREAM_MAGIC};

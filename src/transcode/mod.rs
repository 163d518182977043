//! Transcoder bridge
//!
//! Raw frames go into an external encoder process on one pipe, the encoded
//! elementary stream comes out on another:
//!
//! ```text
//! [capture loop] --write(frame)--> stdin  [ffmpeg]  stdout --read_chunk()--> [broadcaster]
//! ```
//!
//! The broadcaster only sees an [`EncodedOutput`] over any `AsyncRead`, so
//! the encoding technology can change without touching fan-out.

pub mod bridge;
pub mod config;

pub use bridge::{EncodedOutput, Transcoder};
pub use config::TranscoderConfig;

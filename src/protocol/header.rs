//! Stream header
//!
//! Every viewer receives exactly one header before any video byte:
//!
//! ```text
//!  0               4       6       8
//! +---------------+-------+-------+
//! | magic "jsmp"  | width | height|
//! +---------------+-------+-------+
//!                  u16 BE  u16 BE
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Magic tag identifying the stream format
pub const STREAM_MAGIC: [u8; 4] = *b"jsmp";

/// Encoded header length in bytes
pub const HEADER_LEN: usize = 8;

/// Geometry announcement sent once per viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub magic: [u8; 4],
    pub width: u16,
    pub height: u16,
}

impl StreamHeader {
    /// Create a header with the standard magic tag
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            magic: STREAM_MAGIC,
            width,
            height,
        }
    }

    /// Encode to the 8-byte wire form
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN);
        buf.put_slice(&self.magic);
        buf.put_u16(self.width);
        buf.put_u16(self.height);
        buf.freeze()
    }

    /// Decode from the wire form
    ///
    /// Returns `None` if fewer than 8 bytes are available. Trailing bytes
    /// are left in `data`.
    pub fn decode(data: &mut impl Buf) -> Option<Self> {
        if data.remaining() < HEADER_LEN {
            return None;
        }

        let mut magic = [0u8; 4];
        data.copy_to_slice(&mut magic);
        let width = data.get_u16();
        let height = data.get_u16();

        Some(Self {
            magic,
            width,
            height,
        })
    }

    /// Check the magic tag
    pub fn has_valid_magic(&self) -> bool {
        self.magic == STREAM_MAGIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let header = StreamHeader::new(640, 480);
        let bytes = header.encode();

        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[..], b"jsmp\x02\x80\x01\xe0");
    }

    #[test]
    fn test_decode_short_input() {
        let mut buf = Bytes::from_static(b"jsmp\x02");
        assert!(StreamHeader::decode(&mut buf).is_none());
    }

    #[test]
    fn test_decode_leaves_trailing_bytes() {
        let mut buf = Bytes::from_static(b"jsmp\x05\x00\x02\xd0\x00\x00\x01\xb3");
        let header = StreamHeader::decode(&mut buf).unwrap();

        assert!(header.has_valid_magic());
        assert_eq!(header.width, 1280);
        assert_eq!(header.height, 720);
        assert_eq!(&buf[..], b"\x00\x00\x01\xb3");
    }

    #[test]
    fn test_foreign_magic() {
        let mut buf = Bytes::from_static(b"abcd\x00\x01\x00\x01");
        let header = StreamHeader::decode(&mut buf).unwrap();
        assert!(!header.has_valid_magic());
    }
}

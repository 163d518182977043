//! Frame sources
//!
//! A [`FrameSource`] yields raw YUV420 frames of a fixed geometry at its
//! own cadence. Two sources are provided:
//! - [`CameraSource`]: a Raspberry Pi camera through `libcamera-vid`
//! - [`TestPatternSource`]: a synthetic moving gradient, for hosts without
//!   a camera

pub mod camera;
pub mod pattern;

use bytes::Bytes;

use crate::error::Result;

pub use camera::CameraSource;
pub use pattern::TestPatternSource;

/// Capture geometry and rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConfig {
    /// Frame width in pixels
    pub width: u16,
    /// Frame height in pixels
    pub height: u16,
    /// Frames per second
    pub framerate: u32,
    /// Sensor rotation in degrees (0 or 180)
    pub rotation: u16,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            framerate: 24,
            rotation: 180,
        }
    }
}

impl VideoConfig {
    /// Size of one YUV420 frame in bytes
    pub fn frame_len(&self) -> usize {
        let luma = self.width as usize * self.height as usize;
        luma + luma / 2
    }
}

/// Producer of raw video frames
pub trait FrameSource {
    /// Geometry and rate of the frames this source yields
    fn video(&self) -> VideoConfig;

    /// Wait for the next frame
    ///
    /// Returns `None` once the source is exhausted.
    async fn next_frame(&mut self) -> Result<Option<Bytes>>;

    /// Release the underlying device
    async fn close(&mut self) -> Result<()>;
}

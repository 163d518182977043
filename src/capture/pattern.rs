//! Synthetic test pattern source

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::time::{Interval, MissedTickBehavior};

use crate::error::Result;

use super::{FrameSource, VideoConfig};

/// Moving diagonal gradient paced at the configured frame rate
pub struct TestPatternSource {
    video: VideoConfig,
    ticker: Interval,
    frame_index: u64,
    limit: Option<u64>,
}

impl TestPatternSource {
    pub fn new(video: VideoConfig) -> Self {
        let period = Duration::from_secs(1) / video.framerate.max(1);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            video,
            ticker,
            frame_index: 0,
            limit: None,
        }
    }

    /// Stop after `frames` frames
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    fn render(&self) -> Bytes {
        let width = self.video.width as usize;
        let height = self.video.height as usize;
        let shift = self.frame_index as usize;
        let mut frame = BytesMut::with_capacity(self.video.frame_len());

        for y in 0..height {
            for x in 0..width {
                frame.put_u8(((x + y + shift) & 0xff) as u8);
            }
        }
        // Neutral chroma
        frame.put_bytes(0x80, self.video.frame_len() - width * height);

        frame.freeze()
    }
}

impl FrameSource for TestPatternSource {
    fn video(&self) -> VideoConfig {
        self.video
    }

    async fn next_frame(&mut self) -> Result<Option<Bytes>> {
        if self.limit.is_some_and(|limit| self.frame_index >= limit) {
            return Ok(None);
        }

        self.ticker.tick().await;
        let frame = self.render();
        self.frame_index += 1;
        Ok(Some(frame))
    }

    async fn close(&mut self) -> Result<()> {
        tracing::debug!(frames = self.frame_index, "Test pattern closed");
        Ok(())
    }
}

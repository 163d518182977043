//! Raspberry Pi camera source
//!
//! Runs `libcamera-vid` with raw YUV420 output on stdout and slices the
//! byte stream into whole frames.

use std::process::Stdio;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

use crate::error::{Error, Result};

use super::{FrameSource, VideoConfig};

/// Program used to drive the camera
pub const CAMERA_PROGRAM: &str = "libcamera-vid";

/// Camera frames read from a `libcamera-vid` child process
pub struct CameraSource {
    child: Child,
    stdout: ChildStdout,
    video: VideoConfig,
    frames: u64,
}

impl CameraSource {
    /// Start the camera with the given geometry, rate and rotation
    pub fn open(video: VideoConfig) -> Result<Self> {
        let args = camera_args(&video);
        tracing::info!(
            width = video.width,
            height = video.height,
            framerate = video.framerate,
            rotation = video.rotation,
            "Initializing camera"
        );
        tracing::debug!(?args, "{} arguments", CAMERA_PROGRAM);

        let mut child = Command::new(CAMERA_PROGRAM)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Capture(format!("failed to spawn {}: {}", CAMERA_PROGRAM, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Capture("camera stdout not captured".into()))?;

        Ok(Self {
            child,
            stdout,
            video,
            frames: 0,
        })
    }
}

fn camera_args(video: &VideoConfig) -> Vec<String> {
    vec![
        "-t".to_string(),
        "0".to_string(), // Run indefinitely
        "-n".to_string(), // No preview window
        "--codec".to_string(),
        "yuv420".to_string(),
        "--width".to_string(),
        video.width.to_string(),
        "--height".to_string(),
        video.height.to_string(),
        "--framerate".to_string(),
        video.framerate.to_string(),
        "--rotation".to_string(),
        video.rotation.to_string(),
        "-o".to_string(),
        "-".to_string(),
    ]
}

impl FrameSource for CameraSource {
    fn video(&self) -> VideoConfig {
        self.video
    }

    async fn next_frame(&mut self) -> Result<Option<Bytes>> {
        let mut frame = BytesMut::zeroed(self.video.frame_len());

        match self.stdout.read_exact(&mut frame).await {
            Ok(_) => {
                self.frames += 1;
                Ok(Some(frame.freeze()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                let status = self.child.try_wait().ok().flatten();
                Err(Error::Capture(format!(
                    "camera stream ended after {} frames (status {:?})",
                    self.frames, status
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        tracing::info!(frames = self.frames, "Releasing camera");
        if self.child.try_wait()?.is_none() {
            self.child.kill().await?;
        }
        Ok(())
    }
}

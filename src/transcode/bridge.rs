//! Transcoder process bridge
//!
//! Owns the child process that turns raw frames into an encoded stream.
//! The input side ([`Transcoder`]) is driven by the capture loop; the output
//! side ([`EncodedOutput`]) is handed to the broadcaster.

use std::process::{ExitStatus, Stdio};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::{Error, Result};

use super::config::TranscoderConfig;

/// Input side of a running transcoder
pub struct Transcoder {
    child: Child,
    stdin: Option<ChildStdin>,
    frames_written: u64,
}

impl Transcoder {
    /// Spawn the configured transcoder for the given input geometry
    pub fn spawn(
        config: &TranscoderConfig,
        width: u32,
        height: u32,
        framerate: u32,
        quantum: usize,
    ) -> Result<(Self, EncodedOutput<ChildStdout>)> {
        let args = config.args(width, height, framerate);
        tracing::info!(
            program = %config.program,
            codec = %config.codec,
            bitrate = %config.bitrate,
            "Spawning background conversion process"
        );
        tracing::debug!(?args, "Transcoder arguments");

        let mut command = Command::new(&config.program);
        command.args(&args);
        Self::spawn_command(command, quantum)
    }

    /// Spawn an arbitrary command as the transcoder
    ///
    /// The command reads raw frames on stdin and writes the encoded stream
    /// to stdout. Its stderr is discarded.
    pub fn spawn_command(
        mut command: Command,
        quantum: usize,
    ) -> Result<(Self, EncodedOutput<ChildStdout>)> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "transcoder stdout not captured",
            ))
        })?;

        tracing::debug!(pid = ?child.id(), "Transcoder started");

        Ok((
            Self {
                child,
                stdin,
                frames_written: 0,
            },
            EncodedOutput::new(stdout, quantum),
        ))
    }

    /// Push one raw frame into the transcoder
    ///
    /// Waits while the process is not consuming input; frames are never
    /// dropped. Fails with [`Error::TranscoderTerminated`] once the process
    /// has gone away.
    pub async fn write(&mut self, frame: Bytes) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or(Error::TranscoderTerminated { status: None })?;

        match stdin.write_all(&frame).await {
            Ok(()) => {
                self.frames_written += 1;
                Ok(())
            }
            Err(e) if is_disconnect(&e) => {
                self.stdin = None;
                let status = self.child.try_wait().ok().flatten();
                tracing::error!(
                    status = ?status,
                    frames_written = self.frames_written,
                    "Transcoder terminated unexpectedly"
                );
                Err(Error::TranscoderTerminated { status })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether the process is still running
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Number of frames written so far
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Close the input and wait for the process to drain and exit
    pub async fn close(mut self) -> Result<ExitStatus> {
        tracing::info!("Waiting for background conversion process to exit");

        if let Some(mut stdin) = self.stdin.take() {
            // The process may already be gone; that is what we wait for anyway
            let _ = stdin.shutdown().await;
        }

        let status = self.child.wait().await?;
        tracing::info!(%status, frames_written = self.frames_written, "Transcoder exited");
        Ok(status)
    }
}

fn is_disconnect(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::UnexpectedEof
    )
}

/// Output side of a transcoder
///
/// Yields the encoded stream in fixed-size chunks. End of stream means the
/// producer closed its output, which only happens when it exits.
pub struct EncodedOutput<R> {
    reader: R,
    quantum: usize,
}

impl<R: AsyncRead + Unpin> EncodedOutput<R> {
    /// Wrap a reader, chunking its bytes by `quantum`
    pub fn new(reader: R, quantum: usize) -> Self {
        Self {
            reader,
            quantum: quantum.max(1),
        }
    }

    /// Read size of each chunk
    pub fn quantum(&self) -> usize {
        self.quantum
    }

    /// Read the next chunk
    ///
    /// Fills a whole quantum unless the stream ends first, in which case the
    /// final short chunk is returned. Returns `None` at end of stream.
    pub async fn read_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        let mut buf = BytesMut::zeroed(self.quantum);
        let mut filled = 0;

        while filled < self.quantum {
            match self.reader.read(&mut buf[filled..]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if filled == 0 {
            return Ok(None);
        }

        buf.truncate(filled);
        Ok(Some(buf.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_output_chunks_by_quantum() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1300).collect();
        let mut output = EncodedOutput::new(&data[..], 512);

        let a = output.read_chunk().await.unwrap().unwrap();
        let b = output.read_chunk().await.unwrap().unwrap();
        let c = output.read_chunk().await.unwrap().unwrap();

        assert_eq!(a.len(), 512);
        assert_eq!(b.len(), 512);
        assert_eq!(c.len(), 276);
        assert!(output.read_chunk().await.unwrap().is_none());

        let joined: Vec<u8> = [a, b, c].concat();
        assert_eq!(joined, data);
    }

    #[tokio::test]
    async fn test_output_empty_stream() {
        let mut output = EncodedOutput::new(&b""[..], 512);
        assert!(output.read_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_passthrough_process() {
        let (mut transcoder, mut output) =
            Transcoder::spawn_command(Command::new("cat"), 4).unwrap();

        transcoder.write(Bytes::from_static(b"abcd")).await.unwrap();
        transcoder.write(Bytes::from_static(b"efgh")).await.unwrap();
        transcoder.write(Bytes::from_static(b"ij")).await.unwrap();
        assert_eq!(transcoder.frames_written(), 3);

        let status = transcoder.close().await.unwrap();
        assert!(status.success());

        let mut received = Vec::new();
        while let Some(chunk) = output.read_chunk().await.unwrap() {
            received.push(chunk);
        }
        assert_eq!(received, vec![&b"abcd"[..], &b"efgh"[..], &b"ij"[..]]);
    }

    #[tokio::test]
    async fn test_write_after_exit_fails() {
        let (mut transcoder, _output) =
            Transcoder::spawn_command(Command::new("true"), 512).unwrap();

        for _ in 0..50 {
            if !transcoder.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!transcoder.is_running());

        let frame = Bytes::from(vec![0u8; 4096]);
        let err = transcoder.write(frame.clone()).await.unwrap_err();
        assert!(matches!(err, Error::TranscoderTerminated { .. }));

        // Stays terminated
        let err = transcoder.write(frame).await.unwrap_err();
        assert!(matches!(err, Error::TranscoderTerminated { status: None }));
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let config = TranscoderConfig::default().program("robocast-no-such-transcoder");
        let result = Transcoder::spawn(&config, 640, 480, 24, 512);
        assert!(matches!(result, Err(Error::Io(_))));
    }
}

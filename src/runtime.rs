//! Process orchestration
//!
//! Brings the pipeline up and down in a fixed order:
//!
//! ```text
//! start: camera ─► warm-up ─► control server + watchdog ─► stream server
//!              ─► transcoder ─► broadcaster ─► capture loop
//!
//! stop:  capture loop ─► close transcoder ─► join broadcaster
//!              ─► stop servers + watchdog, join ─► stop motors ─► release camera
//! ```
//!
//! The stop sequence runs whether the trigger is an interrupt, the frame
//! source running dry, or a fatal pipeline error. Every join waits for
//! completion.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

use crate::actuator::{ActuatorControl, Watchdog};
use crate::broadcaster::Broadcaster;
use crate::capture::FrameSource;
use crate::config::Config;
use crate::control::{Assets, ControlServer, ControlState};
use crate::error::{Error, Result};
use crate::protocol::StreamHeader;
use crate::registry::ViewerRegistry;
use crate::server::StreamServer;
use crate::stats::{BroadcastStats, StatsSnapshot};
use crate::transcode::Transcoder;

/// Totals reported after a clean stop
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Raw frames handed to the transcoder
    pub frames_written: u64,
    /// Encoded chunks broadcast
    pub chunks_broadcast: u64,
    /// Final statistics
    pub stats: StatsSnapshot,
}

/// Broadcaster before start-up
pub struct Robocast<S> {
    config: Config,
    source: S,
    actuators: Arc<ActuatorControl>,
    registry: Arc<ViewerRegistry>,
    stats: Arc<BroadcastStats>,
}

impl<S: FrameSource> Robocast<S> {
    /// Assemble the pipeline around an acquired frame source
    pub fn new(config: Config, source: S, actuators: Arc<ActuatorControl>) -> Self {
        let registry = Arc::new(ViewerRegistry::with_config(config.registry.clone()));

        Self {
            config,
            source,
            actuators,
            registry,
            stats: Arc::new(BroadcastStats::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ViewerRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<BroadcastStats> {
        &self.stats
    }

    /// Run the start sequence up to, not including, the capture loop
    pub async fn start(self) -> Result<Running<S>> {
        let Self {
            config,
            source,
            actuators,
            registry,
            stats,
        } = self;

        config.validate()?;

        // The source knows what it actually produces
        let video = source.video();
        tracing::info!(
            width = video.width,
            height = video.height,
            framerate = video.framerate,
            "Frame source ready"
        );

        if !config.warmup.is_zero() {
            tracing::info!(warmup_ms = config.warmup.as_millis() as u64, "Warming up");
            tokio::time::sleep(config.warmup).await;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // The page needs the real stream port, so bind the stream listener first
        let header = StreamHeader::new(video.width, video.height);
        let stream_server = StreamServer::bind(
            config.stream.clone(),
            header,
            Arc::clone(&registry),
            Arc::clone(&stats),
        )
        .await?;
        let stream_addr = stream_server.local_addr()?;

        let assets = Assets::load(&config.control.static_dir).await?;
        let state = Arc::new(ControlState::new(
            Arc::clone(&actuators),
            assets,
            &config.control,
            &video,
            stream_addr.port(),
        ));
        let control_server = ControlServer::bind(config.control.bind_addr, state).await?;
        let http_addr = control_server.local_addr()?;

        tracing::info!(addr = %http_addr, "Starting control server");
        let control_task = tokio::spawn(control_server.run_until(stopped(shutdown_rx.clone())));
        let watchdog_task = Watchdog::new(Arc::clone(&actuators), config.watchdog.clone())
            .spawn(stopped(shutdown_rx.clone()));

        tracing::info!(addr = %stream_addr, "Starting stream server");
        let stream_task = tokio::spawn(stream_server.run_until(stopped(shutdown_rx.clone())));

        let spawned = Transcoder::spawn(
            &config.transcoder,
            video.width.into(),
            video.height.into(),
            video.framerate,
            config.stream.read_quantum,
        );
        let (transcoder, output) = match spawned {
            Ok(spawned) => spawned,
            Err(e) => {
                tracing::error!(error = %e, "Failed to start transcoder");
                let _ = shutdown_tx.send(true);
                log_task("Stream server", stream_task.await);
                log_task("Control server", control_task.await);
                let _ = watchdog_task.await;
                actuators.stop();
                let mut source = source;
                let _ = source.close().await;
                return Err(e);
            }
        };

        tracing::info!("Starting broadcast thread");
        let broadcaster =
            Broadcaster::new(output, Arc::clone(&registry), Arc::clone(&stats)).spawn();

        let stats_task = (!config.stats_interval.is_zero()).then(|| {
            tokio::spawn(log_stats(
                Arc::clone(&stats),
                Arc::clone(&registry),
                config.stats_interval,
                stopped(shutdown_rx.clone()),
            ))
        });

        Ok(Running {
            source,
            actuators,
            registry,
            stats,
            stream_addr,
            http_addr,
            shutdown_tx,
            transcoder,
            broadcaster: Some(broadcaster),
            chunks_broadcast: 0,
            control_task,
            stream_task,
            watchdog_task,
            stats_task,
        })
    }

    /// Start, capture until `shutdown` resolves, then stop
    pub async fn run_until<F>(self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        self.start().await?.run_until(shutdown).await
    }
}

/// Broadcaster with every background task running
pub struct Running<S> {
    source: S,
    actuators: Arc<ActuatorControl>,
    registry: Arc<ViewerRegistry>,
    stats: Arc<BroadcastStats>,
    stream_addr: SocketAddr,
    http_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    transcoder: Transcoder,
    broadcaster: Option<JoinHandle<Result<u64>>>,
    /// Set when the broadcaster was joined during capture
    chunks_broadcast: u64,
    control_task: JoinHandle<Result<()>>,
    stream_task: JoinHandle<Result<()>>,
    watchdog_task: JoinHandle<()>,
    stats_task: Option<JoinHandle<()>>,
}

impl<S: FrameSource> Running<S> {
    /// Address of the video stream server
    pub fn stream_addr(&self) -> SocketAddr {
        self.stream_addr
    }

    /// Address of the control server
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn registry(&self) -> &Arc<ViewerRegistry> {
        &self.registry
    }

    /// Feed frames to the transcoder until `shutdown` resolves, the source
    /// is exhausted or the pipeline fails, then run the stop sequence
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let capture = self.capture_until(shutdown).await;
        self.stop(capture).await
    }

    async fn capture_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Some(mut broadcaster) = self.broadcaster.take() else {
            return Err(Error::TranscoderTerminated { status: None });
        };

        tracing::info!("Starting capture");
        tokio::pin!(shutdown);

        loop {
            let step = tokio::select! {
                biased;

                _ = &mut shutdown => Step::Interrupted,
                joined = &mut broadcaster => Step::BroadcastEnded(joined),
                frame = self.source.next_frame() => Step::Frame(frame),
            };

            match step {
                Step::Interrupted => {
                    tracing::info!("Interrupt received, stopping");
                    self.broadcaster = Some(broadcaster);
                    return Ok(());
                }
                Step::BroadcastEnded(joined) => {
                    // The encoded stream only ends when the transcoder exits
                    self.chunks_broadcast = log_broadcaster(joined);
                    return Err(Error::TranscoderTerminated { status: None });
                }
                Step::Frame(Ok(Some(frame))) => {
                    if let Err(e) = self.transcoder.write(frame).await {
                        self.broadcaster = Some(broadcaster);
                        return Err(e);
                    }
                }
                Step::Frame(Ok(None)) => {
                    tracing::info!("Frame source exhausted, stopping");
                    self.broadcaster = Some(broadcaster);
                    return Ok(());
                }
                Step::Frame(Err(e)) => {
                    self.broadcaster = Some(broadcaster);
                    return Err(e);
                }
            }
        }
    }

    async fn stop(self, capture: Result<()>) -> Result<RunSummary> {
        let Running {
            mut source,
            actuators,
            registry: _,
            stats,
            stream_addr: _,
            http_addr: _,
            shutdown_tx,
            transcoder,
            broadcaster,
            chunks_broadcast,
            control_task,
            stream_task,
            watchdog_task,
            stats_task,
        } = self;

        if let Err(e) = &capture {
            tracing::error!(error = %e, "Capture stopped on error");
        }

        let frames_written = transcoder.frames_written();
        let status = match transcoder.close().await {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::error!(error = %e, "Failed to wait for transcoder");
                None
            }
        };

        tracing::info!("Waiting for broadcast thread to finish");
        let chunks_broadcast = match broadcaster {
            Some(handle) => log_broadcaster(handle.await),
            None => chunks_broadcast,
        };

        tracing::info!("Shutting down servers");
        let _ = shutdown_tx.send(true);
        log_task("Stream server", stream_task.await);
        log_task("Control server", control_task.await);
        if let Err(e) = watchdog_task.await {
            tracing::error!(error = %e, "Watchdog task failed");
        }
        if let Some(task) = stats_task {
            let _ = task.await;
        }

        tracing::info!("Stopping motors");
        actuators.stop();

        tracing::info!("Releasing camera");
        if let Err(e) = source.close().await {
            tracing::warn!(error = %e, "Failed to release frame source");
        }

        let snapshot = stats.snapshot();
        tracing::info!(
            frames = frames_written,
            chunks = snapshot.chunks_read,
            bytes = snapshot.bytes_read,
            viewers_total = snapshot.viewers_total,
            viewers_evicted = snapshot.viewers_evicted,
            "Stopped"
        );

        match capture {
            Ok(()) => Ok(RunSummary {
                frames_written,
                chunks_broadcast,
                stats: snapshot,
            }),
            Err(Error::TranscoderTerminated { status: None }) => {
                Err(Error::TranscoderTerminated { status })
            }
            Err(e) => Err(e),
        }
    }
}

enum Step {
    Interrupted,
    BroadcastEnded(std::result::Result<Result<u64>, JoinError>),
    Frame(Result<Option<Bytes>>),
}

/// Resolves once the shutdown flag is raised or its sender is gone
async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

fn log_broadcaster(joined: std::result::Result<Result<u64>, JoinError>) -> u64 {
    match joined {
        Ok(Ok(chunks)) => chunks,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Broadcast thread failed");
            0
        }
        Err(e) => {
            tracing::error!(error = %e, "Broadcast thread panicked");
            0
        }
    }
}

fn log_task(name: &str, joined: std::result::Result<Result<()>, JoinError>) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(task = name, error = %e, "Task failed"),
        Err(e) => tracing::error!(task = name, error = %e, "Task panicked"),
    }
}

async fn log_stats<F>(
    stats: Arc<BroadcastStats>,
    registry: Arc<ViewerRegistry>,
    interval: Duration,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    // First tick fires immediately
    ticker.tick().await;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let snap = stats.snapshot();
                let viewers = registry.viewer_count().await;
                tracing::info!(
                    viewers = viewers,
                    chunks = snap.chunks_read,
                    bitrate = snap.bitrate(),
                    evicted = snap.viewers_evicted,
                    "Broadcast stats"
                );
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_stats_logger_runs_on_its_own_task() {
        let stats = Arc::new(BroadcastStats::new());
        let registry = Arc::new(ViewerRegistry::new());
        let peer: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        let _viewer = registry.add(peer).await;
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(log_stats(
            Arc::clone(&stats),
            Arc::clone(&registry),
            Duration::from_secs(5),
            stopped(stop_rx),
        ));

        stats.on_chunk(512, 1, 0);
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(!task.is_finished());

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_stopped_resolves_when_sender_dropped() {
        let (stop_tx, stop_rx) = watch::channel(false);
        drop(stop_tx);

        tokio::time::timeout(Duration::from_secs(1), stopped(stop_rx))
            .await
            .unwrap();
    }
}

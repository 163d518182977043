//! Process configuration
//!
//! Everything here is fixed at startup. The binary fills it from command
//! line flags; tests build it with the chained setters.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::actuator::WatchdogConfig;
use crate::capture::VideoConfig;
use crate::control::ControlConfig;
use crate::error::{Error, Result};
use crate::registry::RegistryConfig;
use crate::server::StreamServerConfig;
use crate::transcode::TranscoderConfig;

/// Complete broadcaster configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub video: VideoConfig,
    pub transcoder: TranscoderConfig,
    pub stream: StreamServerConfig,
    pub registry: RegistryConfig,
    pub control: ControlConfig,
    pub watchdog: WatchdogConfig,

    /// Pause between opening the camera and starting the servers
    pub warmup: Duration,

    /// Interval between broadcast statistics log lines (zero disables)
    pub stats_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            video: VideoConfig::default(),
            transcoder: TranscoderConfig::default(),
            stream: StreamServerConfig::default(),
            registry: RegistryConfig::default(),
            control: ControlConfig::default(),
            watchdog: WatchdogConfig::default(),
            warmup: Duration::from_secs(1),
            stats_interval: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Set the capture resolution
    pub fn resolution(mut self, width: u16, height: u16) -> Self {
        self.video.width = width;
        self.video.height = height;
        self
    }

    /// Set the capture frame rate
    pub fn framerate(mut self, framerate: u32) -> Self {
        self.video.framerate = framerate;
        self
    }

    /// Set the control server address
    pub fn http_addr(mut self, addr: SocketAddr) -> Self {
        self.control.bind_addr = addr;
        self
    }

    /// Set the stream server address
    pub fn stream_addr(mut self, addr: SocketAddr) -> Self {
        self.stream.bind_addr = addr;
        self
    }

    /// Set the directory the control page assets are read from
    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.control.static_dir = dir.into();
        self
    }

    /// Set the transcoder program
    pub fn transcoder_program(mut self, program: impl Into<String>) -> Self {
        self.transcoder = self.transcoder.program(program);
        self
    }

    /// Set the warm-up delay
    pub fn warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    /// Set the statistics log interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Check the configuration for values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.video.width == 0 || self.video.height == 0 {
            return Err(Error::Config(format!(
                "resolution {}x{} has a zero dimension",
                self.video.width, self.video.height
            )));
        }
        // YUV420 chroma planes are subsampled by two in both directions
        if self.video.width % 2 != 0 || self.video.height % 2 != 0 {
            return Err(Error::Config(format!(
                "resolution {}x{} must be even in both dimensions",
                self.video.width, self.video.height
            )));
        }
        if self.video.framerate == 0 {
            return Err(Error::Config("framerate must be at least 1".into()));
        }
        if self.video.rotation != 0 && self.video.rotation != 180 {
            return Err(Error::Config(format!(
                "rotation {} is not supported (0 or 180)",
                self.video.rotation
            )));
        }
        if self.control.bind_addr.port() != 0
            && self.control.bind_addr.port() == self.stream.bind_addr.port()
        {
            return Err(Error::Config(format!(
                "control and stream servers share port {}",
                self.control.bind_addr.port()
            )));
        }
        if self.registry.viewer_queue_capacity == 0 {
            return Err(Error::Config(
                "viewer queue capacity must be at least one chunk".into(),
            ));
        }
        if self.stream.read_quantum == 0 {
            return Err(Error::Config("read quantum must be at least one byte".into()));
        }
        if self.watchdog.tick.is_zero() || self.watchdog.tick > self.watchdog.threshold {
            return Err(Error::Config(
                "watchdog tick must be non-zero and no longer than the threshold".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.video.width, 640);
        assert_eq!(config.video.height, 480);
        assert_eq!(config.video.framerate, 24);
        assert_eq!(config.control.bind_addr.port(), 8082);
        assert_eq!(config.stream.bind_addr.port(), 8084);
        assert_eq!(config.watchdog.threshold, Duration::from_secs(2));
        assert_eq!(config.warmup, Duration::from_secs(1));
        assert_ok!(config.validate());
    }

    #[test]
    fn test_builder_chaining() {
        let config = Config::default()
            .resolution(320, 240)
            .framerate(30)
            .http_addr("127.0.0.1:9000".parse().unwrap())
            .stream_addr("127.0.0.1:9001".parse().unwrap())
            .static_dir("/srv/robot")
            .transcoder_program("/usr/local/bin/ffmpeg")
            .warmup(Duration::ZERO);

        assert_eq!(config.video.width, 320);
        assert_eq!(config.video.height, 240);
        assert_eq!(config.video.framerate, 30);
        assert_eq!(config.control.bind_addr.port(), 9000);
        assert_eq!(config.stream.bind_addr.port(), 9001);
        assert_eq!(config.control.static_dir, PathBuf::from("/srv/robot"));
        assert_eq!(config.transcoder.program, "/usr/local/bin/ffmpeg");
        assert!(config.warmup.is_zero());
        assert_ok!(config.validate());
    }

    #[test]
    fn test_rejects_bad_geometry() {
        assert!(matches!(
            Config::default().resolution(0, 480).validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::default().resolution(641, 480).validate(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::default().framerate(0).validate(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_rejects_watchdog_tick_beyond_threshold() {
        let mut config = Config::default();
        config.watchdog = WatchdogConfig::default().tick(Duration::from_secs(3));

        assert_err!(config.validate());
    }

    #[test]
    fn test_rejects_zero_sized_buffers() {
        let mut config = Config::default();
        config.registry = RegistryConfig {
            viewer_queue_capacity: 0,
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.stream.read_quantum = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_shared_port() {
        let config = Config::default()
            .http_addr("0.0.0.0:8000".parse().unwrap())
            .stream_addr("0.0.0.0:8000".parse().unwrap());
        assert_err!(config.validate());

        // Ephemeral ports never clash
        let config = Config::default()
            .http_addr("127.0.0.1:0".parse().unwrap())
            .stream_addr("127.0.0.1:0".parse().unwrap());
        assert_ok!(config.validate());
    }
}

//! robocast - camera broadcaster and motor control server

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use robocast::actuator::{ActuatorControl, GpioMotor, LogMotor, EXPLORER_HAT_PINS};
use robocast::capture::{CameraSource, FrameSource, TestPatternSource};
use robocast::{Config, Error, Robocast};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceType {
    /// Raspberry Pi camera via libcamera-vid
    Camera,
    /// Synthetic moving gradient
    TestPattern,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MotorType {
    /// Log commands only
    Log,
    /// Explorer HAT motor lines through sysfs GPIO
    Gpio,
}

#[derive(Parser)]
#[command(name = "robocast")]
#[command(about = "Stream a robot camera to browsers and drive its motors", long_about = None)]
struct Args {
    /// Capture width in pixels
    #[arg(long, default_value = "640")]
    width: u16,

    /// Capture height in pixels
    #[arg(long, default_value = "480")]
    height: u16,

    /// Capture frame rate
    #[arg(long, default_value = "24")]
    framerate: u32,

    /// Sensor rotation in degrees (0 or 180)
    #[arg(long, default_value = "180")]
    rotation: u16,

    /// Port of the control page and motor endpoints
    #[arg(long, default_value = "8082")]
    http_port: u16,

    /// Port of the video stream
    #[arg(long, default_value = "8084")]
    stream_port: u16,

    /// Directory holding index.html and jsmpg.js
    ///
    /// index.html ships in static/. The jsmpeg player script is not
    /// distributed with robocast: copy jsmpg.js (github.com/phoboslab/jsmpeg,
    /// the WebSocket/MPEG-1 player) next to index.html before starting.
    #[arg(long, default_value = "static")]
    static_dir: PathBuf,

    /// Frame source
    #[arg(long, value_enum, default_value = "camera")]
    source: SourceType,

    /// Motor driver
    #[arg(long, value_enum, default_value = "log")]
    motors: MotorType,

    /// Transcoder program (ffmpeg-compatible arguments)
    #[arg(long, default_value = "ffmpeg")]
    transcoder: String,
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config::default()
            .resolution(self.width, self.height)
            .framerate(self.framerate)
            .http_addr(SocketAddr::from(([0, 0, 0, 0], self.http_port)))
            .stream_addr(SocketAddr::from(([0, 0, 0, 0], self.stream_port)))
            .static_dir(self.static_dir.clone())
            .transcoder_program(self.transcoder.clone());
        config.video.rotation = self.rotation;
        config
    }
}

fn actuators(motors: MotorType) -> Result<ActuatorControl> {
    match motors {
        MotorType::Log => Ok(ActuatorControl::new(
            LogMotor::new("one"),
            LogMotor::new("two"),
        )),
        MotorType::Gpio => {
            let [(one_fwd, one_back), (two_fwd, two_back)] = EXPLORER_HAT_PINS;
            let one = GpioMotor::open(one_fwd, one_back).context("Failed to open motor one")?;
            let two = GpioMotor::open(two_fwd, two_back).context("Failed to open motor two")?;
            Ok(ActuatorControl::new(one, two))
        }
    }
}

async fn serve<S: FrameSource>(config: Config, source: S, actuators: ActuatorControl) -> Result<()> {
    let static_dir = config.control.static_dir.clone();
    let result = Robocast::new(config, source, Arc::new(actuators))
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    let summary = match result {
        Ok(summary) => summary,
        Err(e @ Error::Asset { .. }) => {
            return Err(anyhow::Error::new(e).context(format!(
                "{} must contain index.html and the jsmpeg player as jsmpg.js",
                static_dir.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        frames = summary.frames_written,
        chunks = summary.chunks_broadcast,
        viewers = summary.stats.viewers_total,
        "Clean shutdown"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("robocast=info")),
        )
        .init();

    let args = Args::parse();
    let config = args.config();
    config.validate()?;

    info!("robocast starting");
    info!(
        "  Video: {}x{} @ {}fps",
        config.video.width, config.video.height, config.video.framerate
    );
    info!("  Control: http://{}", config.control.bind_addr);
    info!("  Stream: ws://{}", config.stream.bind_addr);

    let actuators = actuators(args.motors)?;

    match args.source {
        SourceType::Camera => {
            info!("Initializing camera");
            let source = CameraSource::open(config.video).context("Failed to open camera")?;
            serve(config, source, actuators).await
        }
        SourceType::TestPattern => {
            info!("Using test pattern source");
            let source = TestPatternSource::new(config.video);
            serve(config, source, actuators).await
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_static_dir_help_names_player_script() {
        let mut command = Args::command();
        let help = command.render_long_help().to_string();

        assert!(help.contains("jsmpg.js"));
        assert!(help.contains("not distributed with robocast"));
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "robocast",
            "--width",
            "320",
            "--height",
            "240",
            "--stream-port",
            "9004",
            "--static-dir",
            "/srv/robot",
            "--source",
            "test-pattern",
        ]);
        let config = args.config();

        assert_eq!(config.video.width, 320);
        assert_eq!(config.video.height, 240);
        assert_eq!(config.stream.bind_addr.port(), 9004);
        assert_eq!(config.control.static_dir, PathBuf::from("/srv/robot"));
        assert!(matches!(args.source, SourceType::TestPattern));
    }
}

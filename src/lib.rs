//! # robocast
//!
//! Low-latency live video from a robot camera to browsers, plus a small
//! HTTP control surface for the robot's two motors.
//!
//! ```text
//!  camera ──frames──► transcoder ──chunks──► broadcaster ──► viewer registry ──► WebSocket viewers
//!
//!  browser ──/move, /stop──► control server ──► ActuatorControl ◄── watchdog
//! ```
//!
//! Viewers receive an 8-byte header (`jsmp`, width, height) followed by the
//! raw encoded stream. Motor commands must keep arriving: after two seconds
//! of silence the watchdog stops both motors.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use robocast::actuator::{ActuatorControl, LogMotor};
//! use robocast::capture::TestPatternSource;
//! use robocast::{Config, Robocast};
//!
//! #[tokio::main]
//! async fn main() -> robocast::Result<()> {
//!     let config = Config::default();
//!     let source = TestPatternSource::new(config.video);
//!     let actuators = Arc::new(ActuatorControl::new(LogMotor::new("left"), LogMotor::new("right")));
//!
//!     let summary = Robocast::new(config, source, actuators)
//!         .run_until(async { let _ = tokio::signal::ctrl_c().await; })
//!         .await?;
//!
//!     println!("broadcast {} chunks", summary.chunks_broadcast);
//!     Ok(())
//! }
//! ```

pub mod actuator;
pub mod broadcaster;
pub mod capture;
pub mod config;
pub mod control;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod runtime;
pub mod server;
pub mod stats;
pub mod transcode;

pub use config::Config;
pub use error::{Error, Result};
pub use runtime::{Robocast, RunSummary, Running};

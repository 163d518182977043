//! Control server
//!
//! Short, stateless HTTP requests that serve the control page and drive the
//! motors:
//!
//! | Path | Effect |
//! |------|--------|
//! | `/` | 301 to `/index.html` |
//! | `/index.html` | Control page, templated with stream port, geometry and colors |
//! | `/jsmpg.js` | Player script |
//! | `/move?direction=forwards\|backwards\|left\|right` | Drive motors, refresh watchdog |
//! | `/stop` | Stop motors |
//!
//! `HEAD` is answered for every `GET` route with headers only.

pub mod assets;
pub mod handlers;
pub mod template;

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use tokio::net::TcpListener;

use crate::actuator::ActuatorControl;
use crate::capture::VideoConfig;
use crate::error::Result;

pub use assets::Assets;

/// Default port of the control server
pub const DEFAULT_HTTP_PORT: u16 = 8082;

/// Control server configuration
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Directory holding `index.html` and `jsmpg.js`
    pub static_dir: PathBuf,

    /// Foreground color substituted into the page
    pub color: String,

    /// Background color substituted into the page
    pub bgcolor: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
            static_dir: PathBuf::from("static"),
            color: "#444".to_string(),
            bgcolor: "#333".to_string(),
        }
    }
}

/// Shared state of all control handlers
pub struct ControlState {
    pub actuators: Arc<ActuatorControl>,
    pub assets: Assets,
    /// Control page with placeholders already substituted
    pub page: Bytes,
}

impl ControlState {
    /// Render the control page once for the fixed process configuration
    pub fn new(
        actuators: Arc<ActuatorControl>,
        assets: Assets,
        config: &ControlConfig,
        video: &VideoConfig,
        stream_port: u16,
    ) -> Self {
        let vars = [
            ("ADDRESS", stream_port.to_string()),
            ("WIDTH", video.width.to_string()),
            ("HEIGHT", video.height.to_string()),
            ("COLOR", config.color.clone()),
            ("BGCOLOR", config.bgcolor.clone()),
        ];
        let page = template::render(&assets.index_template, &vars);

        Self {
            actuators,
            assets,
            page: Bytes::from(page),
        }
    }
}

/// Build the control router
pub fn router(state: Arc<ControlState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/index.html", get(handlers::index))
        .route("/jsmpg.js", get(handlers::script))
        .route("/move", get(handlers::drive))
        .route("/stop", get(handlers::stop))
        .fallback(handlers::not_found)
        .with_state(state)
}

/// HTTP server for the control endpoints
pub struct ControlServer {
    listener: TcpListener,
    state: Arc<ControlState>,
}

impl ControlServer {
    /// Bind the listening socket
    pub async fn bind(addr: SocketAddr, state: Arc<ControlState>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, state })
    }

    /// Address actually bound
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves
    ///
    /// In-flight requests are completed before this returns.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        tracing::info!(addr = %addr, "Control server listening");

        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Control server stopped");
        Ok(())
    }
}

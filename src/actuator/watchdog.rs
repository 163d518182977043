//! Actuator safety watchdog
//!
//! Polls the last-command time on a short tick and stops both channels once
//! commands have been silent for longer than the threshold. It keeps
//! stopping an already stopped pair on every tick until a new command
//! arrives; that is harmless and needs no extra state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::control::ActuatorControl;

/// Watchdog timing
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Maximum silence between movement commands
    pub threshold: Duration,

    /// How often the last-command time is checked
    pub tick: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            threshold: Duration::from_secs(2),
            tick: Duration::from_millis(100),
        }
    }
}

impl WatchdogConfig {
    /// Set the silence threshold
    pub fn threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the check interval
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }
}

/// Background loop enforcing the command silence limit
pub struct Watchdog {
    control: Arc<ActuatorControl>,
    config: WatchdogConfig,
}

impl Watchdog {
    pub fn new(control: Arc<ActuatorControl>, config: WatchdogConfig) -> Self {
        Self { control, config }
    }

    /// Run until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            threshold_ms = self.config.threshold.as_millis() as u64,
            tick_ms = self.config.tick.as_millis() as u64,
            "Motor watchdog started"
        );

        let mut ticker = tokio::time::interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut idle = false;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let stopped = self
                        .control
                        .stop_if_stale(Instant::now(), self.config.threshold);

                    if stopped && !idle {
                        tracing::info!("No recent commands, motors stopped");
                    } else if !stopped && idle {
                        tracing::debug!("Commands resumed");
                    }
                    idle = stopped;
                }
            }
        }

        tracing::info!("Motor watchdog stopped");
    }

    /// Run on its own task
    pub fn spawn<F>(self, shutdown: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(self.run_until(shutdown))
    }
}

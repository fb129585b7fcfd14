//! Check loops and status bookkeeping

use crate::error::{Result, WatchError};
use crate::pinger::Pinger;
use crate::status::ServiceStatus;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Per-service heartbeat receivers returned by [`ConnectionWatcher::start`].
///
/// A receiver yields once per tick (best effort) and closes when the
/// service's loop exits.
pub type Heartbeats = HashMap<String, mpsc::Receiver<()>>;

/// Watcher timing configuration
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Time between two checks of the same service
    pub ping_interval: Duration,
    /// Upper bound for a single ping
    pub ping_timeout: Duration,
    /// Upper bound for a single reconnect attempt
    pub reconnect_timeout: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(5),
            ping_timeout: Duration::from_secs(2),
            reconnect_timeout: Duration::from_secs(2),
        }
    }
}

type StatusMap = Arc<Mutex<HashMap<String, ServiceStatus>>>;

/// Supervises registered services with periodic ping/reconnect cycles.
///
/// Lifecycle: register every service with [`add_service`](Self::add_service),
/// then [`start`](Self::start), then [`stop`](Self::stop). Registration after
/// start is rejected.
pub struct ConnectionWatcher {
    config: WatcherConfig,
    services: HashMap<String, Arc<dyn Pinger>>,
    statuses: StatusMap,
    shutdown_tx: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

impl ConnectionWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            services: HashMap::new(),
            statuses: Arc::new(Mutex::new(HashMap::new())),
            shutdown_tx: None,
            handles: Vec::new(),
        }
    }

    /// Register a service under `name`. A second registration with the same
    /// name replaces the first.
    pub fn add_service(&mut self, name: impl Into<String>, service: Arc<dyn Pinger>) -> Result<()> {
        let name = name.into();
        if self.shutdown_tx.is_some() {
            return Err(WatchError::AlreadyStarted(name));
        }

        self.services.insert(name, service);
        Ok(())
    }

    /// Spawn one check loop per registered service.
    pub fn start(&mut self) -> Result<Heartbeats> {
        if self.shutdown_tx.is_some() {
            return Err(WatchError::AlreadyRunning);
        }

        info!("Starting watcher...");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut heartbeats = HashMap::with_capacity(self.services.len());

        for (name, service) in &self.services {
            let (heartbeat_tx, heartbeat_rx) = mpsc::channel(1);
            heartbeats.insert(name.clone(), heartbeat_rx);

            let check = ServiceCheck {
                name: name.clone(),
                service: Arc::clone(service),
                config: self.config.clone(),
                statuses: Arc::clone(&self.statuses),
            };

            self.handles
                .push(tokio::spawn(check.run(heartbeat_tx, shutdown_rx.clone())));
        }

        self.shutdown_tx = Some(shutdown_tx);

        info!(services = self.services.len(), "Watcher started successfully");

        Ok(heartbeats)
    }

    /// Point-in-time copy of every service status recorded so far.
    ///
    /// Services that have not completed a single check are absent.
    pub fn statuses(&self) -> HashMap<String, ServiceStatus> {
        self.statuses.lock().clone()
    }

    /// Cancel all check loops and wait for them to exit. No status is
    /// written after this returns.
    pub async fn stop(&mut self) {
        info!("Stopping watcher...");

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }

        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "Watcher check loop ended abnormally");
            }
        }

        info!("Watcher stopped successfully");
    }
}

struct ServiceCheck {
    name: String,
    service: Arc<dyn Pinger>,
    config: WatcherConfig,
    statuses: StatusMap,
}

impl ServiceCheck {
    async fn run(self, heartbeat: mpsc::Sender<()>, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.ping_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    // nobody listening is fine
                    let _ = heartbeat.try_send(());

                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => break,
                        outcome = self.check_and_reconnect() => self.record(outcome),
                    }
                }
            }
        }

        debug!(service = %self.name, "Check loop exited");
    }

    async fn check_and_reconnect(&self) -> Option<WatchError> {
        let ping = tokio::time::timeout(self.config.ping_timeout, self.service.ping()).await;
        let ping_error = match ping {
            Ok(Ok(())) => return None,
            Ok(Err(e)) => e,
            Err(_) => WatchError::Timeout {
                operation: "ping",
                after: self.config.ping_timeout,
            },
        };

        warn!(service = %self.name, error = %ping_error, "Ping failed, reconnecting");

        let reconnect =
            tokio::time::timeout(self.config.reconnect_timeout, self.service.reconnect()).await;
        match reconnect {
            Ok(Ok(())) => {
                info!(service = %self.name, "Reconnected");
                None
            }
            Ok(Err(e)) => {
                error!(service = %self.name, error = %e, "Failed to reconnect");
                Some(e)
            }
            Err(_) => {
                let e = WatchError::Timeout {
                    operation: "reconnect",
                    after: self.config.reconnect_timeout,
                };
                error!(service = %self.name, error = %e, "Failed to reconnect");
                Some(e)
            }
        }
    }

    fn record(&self, outcome: Option<WatchError>) {
        let status = ServiceStatus::from_check(outcome.map(|e| e.to_string()));
        self.statuses.lock().insert(self.name.clone(), status);
    }
}

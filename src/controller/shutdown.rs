use crate::controller::server_state::ServerState;
use crate::statistics::stats_aggregator::format_uptime;
use crate::statistics::StatsSnapshot;
use crate::web_interface::StatsServerHandle;
use log::{error, info, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

/// Time given to handlers to finish once the listener is closed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);
/// Time given to the accept loop and to the stats exporter to stop.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
const TOP_SOURCES: usize = 5;

/// Turns a stop request into an orderly shutdown.
///
/// Sequence: clear the running flag, close the listening socket, stop the stats exporter,
/// drain connection handlers for at most the grace period, log the final statistics. The
/// drain is best-effort: a handler blocked in a read only notices shutdown at its next read
/// timeout, and whatever is still running after the grace period is cancelled.
pub struct ShutdownCoordinator {
    state: Arc<ServerState>,
    accept_loop: Mutex<Option<JoinHandle<()>>>,
    stats_server: Mutex<Option<StatsServerHandle>>,
    grace_period: Duration,
    stop_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(
        state: Arc<ServerState>,
        accept_loop: JoinHandle<()>,
        stats_server: Option<StatsServerHandle>,
    ) -> Self {
        Self {
            state,
            accept_loop: Mutex::new(Some(accept_loop)),
            stats_server: Mutex::new(stats_server),
            grace_period: DEFAULT_GRACE_PERIOD,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Runs the shutdown sequence and returns the final statistics.
    ///
    /// Returns `None` without doing anything when shutdown already began.
    pub async fn shutdown(&self) -> Option<StatsSnapshot> {
        if !self.state.begin_shutdown() {
            return None;
        }
        info!("Shutting down DeadlockSSH...");

        let accept_loop = self
            .accept_loop
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut task) = accept_loop {
            if timeout(self.stop_timeout, &mut task).await.is_err() {
                error!("Accept loop did not stop in time, aborting it");
                task.abort();
            }
        }

        let stats_server = self
            .stats_server
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(server) = stats_server {
            if !server.shutdown(self.stop_timeout).await {
                warn!("HTTP stats server did not shut down gracefully.");
            }
        }

        self.drain_handlers().await;

        let snapshot = self.state.stats.snapshot();
        info!("Final statistics:");
        info!("  Total connections: {}", snapshot.total_connections);
        info!("  Uptime: {}", format_uptime(self.state.stats.uptime()));
        info!(
            "  Top attacking IPs: {}",
            format_top_sources(&snapshot.top_sources(TOP_SOURCES))
        );
        info!("DeadlockSSH shutdown complete");

        Some(snapshot)
    }

    async fn drain_handlers(&self) {
        let started = Instant::now();

        loop {
            self.state.handlers.reap();
            let remaining = self.state.handlers.len();
            if remaining == 0 {
                return;
            }
            if started.elapsed() >= self.grace_period {
                warn!(
                    "{} connection handler(s) still running after {:?}, proceeding",
                    remaining, self.grace_period
                );
                self.state.handlers.abort_all();
                return;
            }
            sleep(DRAIN_POLL_INTERVAL).await;
        }
    }
}

fn format_top_sources(sources: &[(String, u64)]) -> String {
    let entries: Vec<String> = sources
        .iter()
        .map(|(addr, count)| format!("'{}': {}", addr, count))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

/// Resolves on SIGINT or, on unix, SIGTERM.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        if let Err(e) = res {
                            error!("Unable to listen for SIGINT: {}", e);
                        }
                        info!("Received SIGINT, shutting down gracefully...");
                    }
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
                }
                return;
            }
            Err(e) => warn!("Unable to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for SIGINT: {}", e);
    }
    info!("Received SIGINT, shutting down gracefully...");
}

use super::server_state::ServerState;
use super::shutdown::{wait_for_signal, ShutdownCoordinator, DEFAULT_GRACE_PERIOD};
use crate::configuration::Config;
use crate::error_handling::types::*;
use crate::network::NetworkListener;
use crate::statistics::StatsSnapshot;
use crate::tarpit::TarpitSettings;
use crate::web_interface::StatsServer;
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Wires the honeypot together from a [`Config`].
pub struct Controller {
    pub config: Config,
    grace_period: Duration,
}

/// A started honeypot: addresses it is reachable on and the way to stop it.
pub struct RunningServer {
    pub local_addr: SocketAddr,
    pub stats_addr: Option<SocketAddr>,
    pub coordinator: ShutdownCoordinator,
}

impl RunningServer {
    pub fn state(&self) -> &Arc<ServerState> {
        self.coordinator.state()
    }

    pub async fn shutdown(&self) -> Option<StatsSnapshot> {
        self.coordinator.shutdown().await
    }
}

impl Controller {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Overrides how long shutdown waits for connection handlers.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Binds the honeypot port, starts the stats exporter if enabled and spawns the accept
    /// loop.
    ///
    /// # Errors
    ///
    /// Fails only when the honeypot port cannot be bound. A stats exporter that cannot bind is
    /// logged and left out.
    pub fn start(&self) -> Result<RunningServer, ControllerError> {
        let state = Arc::new(ServerState::new(TarpitSettings::from(&self.config)));

        let listener = NetworkListener::bind(
            self.config.port,
            self.config.max_connections,
            self.config.tcp_keepalive,
            Arc::clone(&state),
        )?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ControllerError::InitializationFailed(e.to_string()))?;
        info!("DeadlockSSH listening on port {}", local_addr.port());

        let stats_server = if self.config.enable_http_stats {
            match StatsServer::start(self.config.http_stats_port, Arc::clone(&state.stats)) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    error!("Failed to start HTTP Stats Server: {}", e);
                    None
                }
            }
        } else {
            None
        };
        let stats_addr = stats_server.as_ref().map(|s| s.local_addr());

        let accept_loop = tokio::spawn(listener.run());

        Ok(RunningServer {
            local_addr,
            stats_addr,
            coordinator: ShutdownCoordinator::new(state, accept_loop, stats_server)
                .with_grace_period(self.grace_period),
        })
    }

    /// Runs until SIGINT/SIGTERM, then shuts down gracefully.
    pub async fn run(self) -> Result<(), ControllerError> {
        let server = self.start()?;

        wait_for_signal().await;
        server.shutdown().await;

        Ok(())
    }
}

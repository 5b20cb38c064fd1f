use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::routes::stats_routes;
use crate::error_handling::types::WebError;
use crate::statistics::StatsAggregator;

/// Read-only HTTP exporter for the server statistics.
pub struct StatsServer;

/// Handle on a running [`StatsServer`].
pub struct StatsServerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl StatsServer {
    /// Binds `0.0.0.0:port` and serves the statistics routes on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(port: u16, stats: Arc<StatsAggregator>) -> Result<StatsServerHandle, WebError> {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let addr: SocketAddr = ([0, 0, 0, 0], port).into();

        let (bound, server) = warp::serve(stats_routes(stats))
            .try_bind_with_graceful_shutdown(addr, async move {
                let _ = shutdown_rx.await;
            })
            .map_err(|e| WebError::BindError(e.to_string()))?;

        info!("HTTP Stats Server listening on port {}", bound.port());

        Ok(StatsServerHandle {
            addr: bound,
            shutdown_tx: Some(shutdown_tx),
            task: tokio::spawn(server),
        })
    }
}

impl StatsServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Asks the server to stop and waits up to `wait` for it.
    ///
    /// Returns `false` if it did not stop in time, in which case its task is aborted.
    pub async fn shutdown(mut self, wait: Duration) -> bool {
        info!("Shutting down HTTP Stats Server...");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        match timeout(wait, &mut self.task).await {
            Ok(_) => true,
            Err(_) => {
                self.task.abort();
                false
            }
        }
    }
}

//! # Network Listener Module
//!
//! This module owns the honeypot's listening socket. The [`NetworkListener`] accepts incoming
//! TCP connections, accounts for them in the shared statistics and hands each one to its own
//! connection handler task.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌────────────────────┐
//! │ Incoming        │───▶│ NetworkListener  │───▶│ handle_connection  │
//! │ Connections     │    │                  │    │ (one task each)    │
//! └─────────────────┘    │ - Stats on accept│    └────────────────────┘
//!                        │ - Keepalive      │
//!                        │ - Handler reaping│
//!                        └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use deadlockssh::configuration::Config;
//! use deadlockssh::controller::server_state::ServerState;
//! use deadlockssh::network::network_listener::NetworkListener;
//! use deadlockssh::tarpit::TarpitSettings;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let state = Arc::new(ServerState::new(TarpitSettings::from(&config)));
//!     let listener = NetworkListener::bind(config.port, config.max_connections, true, state)
//!         .expect("bind failed");
//!
//!     listener.run().await;
//! }
//! ```

use crate::controller::server_state::ServerState;
use crate::error_handling::types::NetworkError;
use crate::session_management::{handle_connection, ConnectionSession};
use log::{debug, error, info, warn};
use socket2::SockRef;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::sleep;

/// Pause after a failed accept, so descriptor exhaustion does not spin the loop.
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// The honeypot's accept loop.
///
/// `NetworkListener` is responsible for:
/// - Binding the configured port on all interfaces with the configured backlog
/// - Enabling TCP keepalive on the listening and accepted sockets when asked to
/// - Counting every accepted connection before its handler starts
/// - Spawning one handler per connection and reaping finished ones
///
/// The backlog only bounds connections waiting to be accepted; the number of live handlers is
/// not limited.
pub struct NetworkListener {
    listener: TcpListener,
    tcp_keepalive: bool,
    state: Arc<ServerState>,
}

impl NetworkListener {
    /// Binds `0.0.0.0:port` and starts listening.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `NetworkError::SockError` if the socket cannot be created or configured
    /// - `NetworkError::BindError` if the port is taken or privileged
    /// - `NetworkError::ListenError` if the socket cannot enter listening state
    pub fn bind(
        port: u16,
        backlog: u32,
        tcp_keepalive: bool,
        state: Arc<ServerState>,
    ) -> Result<Self, NetworkError> {
        let socket = TcpSocket::new_v4().map_err(|e| {
            error!("[!] Socket error: {:?}", e);
            NetworkError::SockError(e)
        })?;
        socket.set_reuseaddr(true).map_err(NetworkError::SockError)?;
        if tcp_keepalive {
            socket.set_keepalive(true).map_err(NetworkError::SockError)?;
        }

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        socket.bind(addr).map_err(|e| {
            error!("[!] Unable to bind {}: {}", addr, e);
            NetworkError::BindError(e)
        })?;
        let listener = socket.listen(backlog).map_err(NetworkError::ListenError)?;

        Ok(Self {
            listener,
            tcp_keepalive,
            state,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until shutdown begins, then drops (closes) the listening socket.
    ///
    /// Accept failures while running are logged and the loop carries on after
    /// [`ACCEPT_ERROR_BACKOFF`].
    pub async fn run(self) {
        let mut shutdown_rx = self.state.subscribe_shutdown();

        loop {
            if !self.state.is_running() {
                break;
            }

            tokio::select! {
                _ = shutdown_rx.changed() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.dispatch(stream, peer),
                    Err(e) => {
                        if self.recover_from_accept_error(&e).await {
                            continue;
                        }
                        break;
                    }
                },
            }
        }

        info!("Stopped accepting connections");
    }

    /// Returns whether the accept loop should go on.
    async fn recover_from_accept_error(&self, e: &io::Error) -> bool {
        if !self.state.is_running() {
            return false;
        }
        error!("Socket error: {}", e);
        sleep(ACCEPT_ERROR_BACKOFF).await;
        true
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        if self.tcp_keepalive {
            if let Err(e) = SockRef::from(&stream).set_keepalive(true) {
                warn!("Unable to enable keepalive for {}: {}", peer, e);
            }
        }

        let session = {
            let attempt = self.state.stats.connection_opened(&peer.ip().to_string());
            ConnectionSession::new(peer, attempt)
        };
        debug!("[{}] Accepted {}", session.id, peer);

        self.state
            .handlers
            .spawn(handle_connection(stream, session, Arc::clone(&self.state)));

        let reaped = self.state.handlers.reap();
        if reaped > 0 {
            debug!("Reaped {} finished connection handlers", reaped);
        }
    }
}

//! Per-connection session handling.
//!
//! This module provides the connection state machine, the transient session record and the
//! handler that walks an accepted connection through the tarpit.

use std::fmt;

/// Submodule for the connection handler driving one session.
pub mod connection_handler;
/// Submodule for the session record.
pub mod session;

pub use connection_handler::handle_connection;
pub use session::ConnectionSession;

/// Represents the stage a connection is in.
///
/// Stages are strictly sequential and ordered:
/// - `Accepted`: the socket was just handed over by the listener.
/// - `Delaying`: the adaptive per-source delay is running.
/// - `Banner`: the greeting is being trickled out.
/// - `Monitoring`: client input is being read and logged.
/// - `Closed`: terminal, reached on every exit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    Accepted,
    Delaying,
    Banner,
    Monitoring,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Accepted => "ACCEPTED",
            ConnectionState::Delaying => "DELAYING",
            ConnectionState::Banner => "BANNER",
            ConnectionState::Monitoring => "MONITORING",
            ConnectionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

use super::ConnectionState;
use chrono::{DateTime, Utc};
use log::debug;
use std::net::SocketAddr;
use uuid::Uuid;

/// Transient record of one accepted connection.
#[derive(Debug, Clone)]
pub struct ConnectionSession {
    pub id: Uuid,
    pub peer: SocketAddr,
    /// Peer IP without the port, the key of the delay tracker and of the per-source counts.
    pub source: String,
    pub accepted_at: DateTime<Utc>,
    /// How many connections this source has opened so far, this one included.
    pub attempt: u64,
    pub bytes_received: u64,
    state: ConnectionState,
}

impl ConnectionSession {
    pub fn new(peer: SocketAddr, attempt: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            source: peer.ip().to_string(),
            accepted_at: Utc::now(),
            attempt,
            bytes_received: 0,
            state: ConnectionState::Accepted,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Moves the session forward. Going backwards is ignored; the machine never loops.
    pub fn transition(&mut self, next: ConnectionState) {
        if next <= self.state {
            return;
        }
        debug!("[{}] {} -> {}", self.id, self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_accepted() {
        let session = ConnectionSession::new("10.0.0.5:40022".parse().unwrap(), 3);

        assert_eq!(session.state(), ConnectionState::Accepted);
        assert_eq!(session.source, "10.0.0.5");
        assert_eq!(session.attempt, 3);
    }

    #[test]
    fn test_transitions_only_move_forward() {
        let mut session = ConnectionSession::new("[2001:db8::1]:22".parse().unwrap(), 1);
        assert_eq!(session.source, "2001:db8::1");

        session.transition(ConnectionState::Delaying);
        session.transition(ConnectionState::Banner);
        session.transition(ConnectionState::Accepted);
        assert_eq!(session.state(), ConnectionState::Banner);

        session.transition(ConnectionState::Closed);
        session.transition(ConnectionState::Monitoring);
        assert_eq!(session.state(), ConnectionState::Closed);
    }
}

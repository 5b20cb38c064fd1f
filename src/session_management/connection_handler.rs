use super::{ConnectionSession, ConnectionState};
use crate::controller::server_state::ServerState;
use crate::tarpit::{BannerTrickler, InputMonitor, MonitorOutcome};
use chrono::Utc;
use log::{error, info};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::time::{sleep, timeout};

/// Teardown bookkeeping for one session.
///
/// Runs on drop so the delay escalation, the active counter and the closure log happen on
/// every exit path, including a handler task cancelled during shutdown.
struct Teardown {
    session: ConnectionSession,
    state: Arc<ServerState>,
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.session.transition(ConnectionState::Closed);
        self.state
            .delay_tracker
            .record_connection_end(&self.session.source);
        self.state.stats.connection_closed();

        let duration = Utc::now() - self.session.accepted_at;
        info!(
            "[{}] Connection from {} closed ({} bytes received, {}s)",
            self.session.id,
            self.session.source,
            self.session.bytes_received,
            duration.num_seconds()
        );
    }
}

/// Walks one accepted connection through the tarpit.
///
/// `Accepted -> Delaying -> Banner -> Monitoring -> Closed`. The connection timeout bounds
/// every write and read on `stream`. Nothing that goes wrong here is reported to the caller;
/// the client simply sees the connection close.
pub async fn handle_connection<S>(
    mut stream: S,
    session: ConnectionSession,
    state: Arc<ServerState>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let settings = state.settings.clone();
    let mut conn = Teardown {
        session,
        state: Arc::clone(&state),
    };

    conn.session.transition(ConnectionState::Delaying);
    let delay = state.delay_tracker.get_delay(&conn.session.source);
    info!(
        "[{}] Connection from {} (attempt #{}, delay: {:.1}s)",
        conn.session.id, conn.session.peer, conn.session.attempt, delay
    );
    if delay > 0.0 {
        sleep(Duration::from_secs_f64(delay)).await;
    }

    conn.session.transition(ConnectionState::Banner);
    let trickler = BannerTrickler::new(
        &settings.ssh_banner,
        settings.banner_delay,
        settings.connection_timeout,
    );
    trickler.send(&mut stream).await;

    conn.session.transition(ConnectionState::Monitoring);
    let monitor = InputMonitor::new(settings.max_input_length, settings.connection_timeout);
    let report = monitor
        .run(
            &mut stream,
            conn.session.id,
            &conn.session.source,
            state.running_flag(),
        )
        .await;
    conn.session.bytes_received = report.bytes_received;

    match report.outcome {
        MonitorOutcome::PeerClosed => {
            info!("[{}] Connection from {} closed by peer", conn.session.id, conn.session.source)
        }
        MonitorOutcome::Shutdown => info!(
            "[{}] Connection from {} interrupted by shutdown",
            conn.session.id, conn.session.source
        ),
        MonitorOutcome::Failed(e) => match e.kind() {
            io::ErrorKind::ConnectionReset => info!(
                "[{}] Connection from {} reset by peer",
                conn.session.id, conn.session.source
            ),
            io::ErrorKind::TimedOut => info!(
                "[{}] Connection from {} timed out",
                conn.session.id, conn.session.source
            ),
            _ => error!(
                "[{}] Error handling client {}: {}",
                conn.session.id, conn.session.source, e
            ),
        },
    }

    let _ = timeout(settings.connection_timeout, stream.shutdown()).await;
    drop(stream);
}

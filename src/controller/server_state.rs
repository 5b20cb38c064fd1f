use crate::network::handler_registry::HandlerRegistry;
use crate::statistics::StatsAggregator;
use crate::tarpit::{DelayTracker, TarpitSettings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Process-wide state shared by the listener, every connection handler, the stats exporter
/// and the shutdown path.
///
/// Created once at startup and handed around as `Arc<ServerState>`. Each shared structure
/// carries its own lock, no lock spans two of them.
#[derive(Debug)]
pub struct ServerState {
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    pub settings: TarpitSettings,
    pub delay_tracker: DelayTracker,
    pub stats: Arc<StatsAggregator>,
    pub handlers: HandlerRegistry,
}

impl ServerState {
    pub fn new(settings: TarpitSettings) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            running: AtomicBool::new(true),
            shutdown_tx,
            delay_tracker: DelayTracker::new(
                settings.initial_delay,
                settings.delay_increment,
                settings.max_delay,
            ),
            settings,
            stats: Arc::new(StatsAggregator::new()),
            handlers: HandlerRegistry::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Flag polled by handlers at each read wake-up.
    pub fn running_flag(&self) -> &AtomicBool {
        &self.running
    }

    /// Clears the running flag and wakes the accept loop.
    ///
    /// Returns `false` when shutdown had already begun.
    pub fn begin_shutdown(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.shutdown_tx.send_replace(true);
        true
    }

    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }
}

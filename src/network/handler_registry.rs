use log::error;
use std::future::Future;
use std::sync::Mutex;
use tokio::task::JoinSet;

/// Live connection handler tasks.
///
/// The listener spawns every handler here and reaps finished ones after each accept; the
/// shutdown path reaps while draining. A panicking handler is logged and reaped like any
/// other, it never reaches the listener.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    tasks: Mutex<JoinSet<()>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, handler: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.lock().spawn(handler);
    }

    /// Drops the bookkeeping of every finished handler and returns how many were reaped.
    pub fn reap(&self) -> usize {
        let mut tasks = self.lock();
        let mut reaped = 0;
        while let Some(res) = tasks.try_join_next() {
            if let Err(e) = res {
                if e.is_panic() {
                    error!("Connection handler panicked: {}", e);
                }
            }
            reaped += 1;
        }
        reaped
    }

    /// Number of handlers not reaped yet.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancels every handler still registered. Their teardown runs when the runtime drops
    /// the cancelled tasks.
    pub fn abort_all(&self) {
        self.lock().abort_all();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

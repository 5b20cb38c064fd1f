use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;

/// Adaptive delay keyed by client address.
///
/// A source that was never seen gets `initial_delay`. Each finished connection from a source
/// raises its stored delay by `delay_increment`, capped at `max_delay`. Records are never
/// evicted.
///
/// The map sits behind a single mutex and every operation is one short critical section, so
/// the read-modify-write in [`DelayTracker::record_connection_end`] cannot lose increments
/// when the same source tears down several connections at once.
#[derive(Debug)]
pub struct DelayTracker {
    initial_delay: f64,
    delay_increment: f64,
    max_delay: f64,
    delays: Mutex<HashMap<String, f64>>,
}

impl DelayTracker {
    pub fn new(initial_delay: f64, delay_increment: f64, max_delay: f64) -> Self {
        Self {
            initial_delay: initial_delay.max(0.0),
            delay_increment: delay_increment.max(0.0),
            max_delay: max_delay.max(0.0),
            delays: Mutex::new(HashMap::new()),
        }
    }

    /// Delay in seconds to apply before the banner of a new connection from `address`.
    pub fn get_delay(&self, address: &str) -> f64 {
        let delays = self.delays.lock().unwrap_or_else(|e| e.into_inner());
        let stored = delays.get(address).copied().unwrap_or(self.initial_delay);
        stored.min(self.max_delay)
    }

    /// Escalates the delay of `address` once a connection from it is torn down.
    ///
    /// Returns the new stored delay.
    pub fn record_connection_end(&self, address: &str) -> f64 {
        let mut delays = self.delays.lock().unwrap_or_else(|e| e.into_inner());
        let entry = delays
            .entry(address.to_string())
            .or_insert(self.initial_delay);
        *entry = (*entry + self.delay_increment).min(self.max_delay);
        let updated = *entry;
        drop(delays);

        debug!("Next delay for {} is {:.1}s", address, updated);
        updated
    }

    /// Number of distinct sources with a stored delay.
    pub fn tracked_sources(&self) -> usize {
        self.delays.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_unseen_source_gets_initial_delay() {
        let tracker = DelayTracker::new(1.0, 2.0, 60.0);

        assert_eq!(tracker.get_delay("192.0.2.1"), 1.0);
        assert_eq!(tracker.tracked_sources(), 0);
    }

    #[test]
    fn test_escalation_is_capped() {
        let tracker = DelayTracker::new(1.0, 2.0, 5.0);
        let mut observed = Vec::new();

        for _ in 0..4 {
            observed.push(tracker.get_delay("10.0.0.5"));
            tracker.record_connection_end("10.0.0.5");
        }

        assert_eq!(observed, vec![1.0, 3.0, 5.0, 5.0]);
    }

    #[test]
    fn test_sequential_cycles_follow_closed_form() {
        let (initial, increment, max) = (0.5, 1.5, 20.0);
        let tracker = DelayTracker::new(initial, increment, max);

        for n in 0..20u32 {
            let expected = (initial + f64::from(n) * increment).min(max);
            assert!((tracker.get_delay("203.0.113.9") - expected).abs() < 1e-9);
            tracker.record_connection_end("203.0.113.9");
        }
    }

    #[test]
    fn test_sources_are_independent() {
        let tracker = DelayTracker::new(1.0, 2.0, 60.0);

        tracker.record_connection_end("10.0.0.5");
        tracker.record_connection_end("10.0.0.5");

        assert_eq!(tracker.get_delay("10.0.0.5"), 5.0);
        assert_eq!(tracker.get_delay("10.0.0.6"), 1.0);
        assert_eq!(tracker.tracked_sources(), 1);
    }

    #[test]
    fn test_initial_delay_above_max_is_capped_on_read() {
        let tracker = DelayTracker::new(10.0, 2.0, 4.0);

        assert_eq!(tracker.get_delay("10.0.0.7"), 4.0);
        assert_eq!(tracker.record_connection_end("10.0.0.7"), 4.0);
    }

    #[test]
    fn test_concurrent_teardowns_do_not_lose_increments() {
        let tracker = Arc::new(DelayTracker::new(0.0, 1.0, 1_000_000.0));
        let mut workers = Vec::new();

        for _ in 0..8 {
            let tracker = Arc::clone(&tracker);
            workers.push(thread::spawn(move || {
                for _ in 0..250 {
                    tracker.record_connection_end("198.51.100.4");
                }
            }));
        }
        for w in workers {
            w.join().unwrap();
        }

        assert_eq!(tracker.get_delay("198.51.100.4"), 2000.0);
    }
}

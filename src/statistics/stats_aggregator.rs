use super::types::StatsSnapshot;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Live server counters shared by the listener, every handler and the stats exporter.
///
/// Counters are atomics. The per-source map is behind a mutex which is also held while the
/// totals move on accept, so a [`StatsSnapshot`] always has `total_connections` equal to the
/// sum of its per-source counts.
#[derive(Debug)]
pub struct StatsAggregator {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    connections_per_source: Mutex<HashMap<String, u64>>,
    start_time: DateTime<Utc>,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            connections_per_source: Mutex::new(HashMap::new()),
            start_time: Utc::now(),
        }
    }

    /// Accounts for an accepted connection and returns the attempt number of `source`.
    pub fn connection_opened(&self, source: &str) -> u64 {
        let mut per_source = self
            .connections_per_source
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let count = per_source.entry(source.to_string()).or_insert(0);
        *count += 1;
        self.total_connections.fetch_add(1, Ordering::SeqCst);
        self.active_connections.fetch_add(1, Ordering::SeqCst);
        *count
    }

    /// Accounts for a torn down connection. Never goes below zero.
    pub fn connection_closed(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::SeqCst)
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::SeqCst)
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn uptime(&self) -> TimeDelta {
        Utc::now() - self.start_time
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let per_source = self
            .connections_per_source
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let connections_per_source: BTreeMap<String, u64> = per_source
            .iter()
            .map(|(addr, count)| (addr.clone(), *count))
            .collect();
        let total_connections = self.total_connections.load(Ordering::SeqCst);
        drop(per_source);

        StatsSnapshot {
            total_connections,
            active_connections: self.active_connections.load(Ordering::SeqCst),
            connections_per_source,
            start_time: self.start_time,
        }
    }
}

/// Renders an uptime as `HH:MM:SS`, prefixed by the day count when it exceeds a day.
pub fn format_uptime(uptime: TimeDelta) -> String {
    let secs = uptime.num_seconds().max(0);
    let (days, rest) = (secs / 86_400, secs % 86_400);
    let clock = format!("{:02}:{:02}:{:02}", rest / 3600, (rest % 3600) / 60, rest % 60);

    if days > 0 {
        format!("{}d {}", days, clock)
    } else {
        clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_open_and_close_update_counters() {
        let stats = StatsAggregator::new();

        assert_eq!(stats.connection_opened("10.0.0.5"), 1);
        assert_eq!(stats.connection_opened("10.0.0.5"), 2);
        assert_eq!(stats.connection_opened("10.0.0.6"), 1);
        assert_eq!(stats.total_connections(), 3);
        assert_eq!(stats.active_connections(), 3);

        stats.connection_closed();
        assert_eq!(stats.total_connections(), 3);
        assert_eq!(stats.active_connections(), 2);
    }

    #[test]
    fn test_active_never_goes_negative() {
        let stats = StatsAggregator::new();

        stats.connection_closed();
        stats.connection_closed();

        assert_eq!(stats.active_connections(), 0);
    }

    #[test]
    fn test_snapshot_is_detached_from_live_state() {
        let stats = StatsAggregator::new();
        stats.connection_opened("10.0.0.5");

        let snapshot = stats.snapshot();
        stats.connection_opened("10.0.0.6");

        assert_eq!(snapshot.total_connections, 1);
        assert_eq!(snapshot.connections_per_source.len(), 1);
        assert_eq!(stats.snapshot().total_connections, 2);
    }

    #[test]
    fn test_concurrent_updates_and_snapshots_stay_consistent() {
        let stats = Arc::new(StatsAggregator::new());
        let mut workers = Vec::new();

        for i in 0..4 {
            let stats = Arc::clone(&stats);
            workers.push(thread::spawn(move || {
                for _ in 0..500 {
                    stats.connection_opened(&format!("10.0.0.{}", i));
                    stats.connection_closed();
                }
            }));
        }
        let reader = {
            let stats = Arc::clone(&stats);
            thread::spawn(move || {
                for _ in 0..200 {
                    let snap = stats.snapshot();
                    let sum: u64 = snap.connections_per_source.values().sum();
                    assert_eq!(sum, snap.total_connections);
                }
            })
        };

        for w in workers {
            w.join().unwrap();
        }
        reader.join().unwrap();

        let snap = stats.snapshot();
        assert_eq!(snap.total_connections, 2000);
        assert_eq!(snap.active_connections, 0);
        assert_eq!(snap.connections_per_source["10.0.0.3"], 500);
    }

    #[test]
    fn test_top_sources_ordering() {
        let stats = StatsAggregator::new();
        for _ in 0..3 {
            stats.connection_opened("10.0.0.9");
        }
        stats.connection_opened("10.0.0.2");
        stats.connection_opened("10.0.0.1");

        let top = stats.snapshot().top_sources(2);

        assert_eq!(
            top,
            vec![("10.0.0.9".to_string(), 3), ("10.0.0.1".to_string(), 1)]
        );
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(TimeDelta::seconds(59)), "00:00:59");
        assert_eq!(format_uptime(TimeDelta::seconds(3_725)), "01:02:05");
        assert_eq!(format_uptime(TimeDelta::seconds(90_061)), "1d 01:01:01");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable point-in-time copy of the server counters.
///
/// Serializes to the JSON document served on `GET /stats`, `start_time` as RFC 3339.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_connections: u64,
    pub active_connections: u64,
    pub connections_per_source: BTreeMap<String, u64>,
    pub start_time: DateTime<Utc>,
}

impl StatsSnapshot {
    /// The `n` busiest sources, highest count first and ties by address.
    pub fn top_sources(&self, n: usize) -> Vec<(String, u64)> {
        let mut sources: Vec<(String, u64)> = self
            .connections_per_source
            .iter()
            .map(|(addr, count)| (addr.clone(), *count))
            .collect();
        sources.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sources.truncate(n);
        sources
    }
}

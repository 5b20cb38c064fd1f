pub mod stats_aggregator;
pub mod types;

pub use stats_aggregator::StatsAggregator;
pub use types::StatsSnapshot;

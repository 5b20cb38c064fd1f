// Statistics HTTP exporter
pub mod routes;
pub mod web_server;

pub use routes::stats_routes;
pub use web_server::{StatsServer, StatsServerHandle};

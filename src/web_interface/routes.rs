use log::{info, warn};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::path::FullPath;
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use crate::statistics::StatsAggregator;

const NOT_FOUND_BODY: &str = "<h1>404 Not Found</h1>";

fn describe(remote: Option<SocketAddr>) -> String {
    remote
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// GET /stats
pub fn stats_route(
    stats: Arc<StatsAggregator>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("stats")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::addr::remote())
        .map(move |remote: Option<SocketAddr>| {
            info!("HTTP Stats request from {}: /stats", describe(remote));
            reply::with_status(reply::json(&stats.snapshot()), StatusCode::OK)
        })
}

/// Anything else. Never rejects, so it closes the route chain.
pub fn not_found_route() -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    warp::path::full()
        .and(warp::addr::remote())
        .map(|path: FullPath, remote: Option<SocketAddr>| {
            warn!(
                "HTTP Stats request from {}: {} (404)",
                describe(remote),
                path.as_str()
            );
            reply::with_status(reply::html(NOT_FOUND_BODY), StatusCode::NOT_FOUND)
        })
}

pub fn stats_routes(
    stats: Arc<StatsAggregator>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    stats_route(stats).or(not_found_route())
}

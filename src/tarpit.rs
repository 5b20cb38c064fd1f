//! Tarpit building blocks.
//!
//! Everything a connection goes through between accept and close lives here: the adaptive
//! per-source delay, the paced banner and the bounded input monitor. The orchestration of
//! these pieces is done by the connection handler in `session_management`.

pub mod banner_trickler;
pub mod delay_tracker;
pub mod input_monitor;

pub use banner_trickler::BannerTrickler;
pub use delay_tracker::DelayTracker;
pub use input_monitor::{InputBuffer, InputMonitor, MonitorOutcome};

use crate::configuration::Config;
use std::time::Duration;

/// Runtime view of the configuration values used on the connection path.
#[derive(Debug, Clone)]
pub struct TarpitSettings {
    pub ssh_banner: String,
    pub banner_delay: Duration,
    pub initial_delay: f64,
    pub delay_increment: f64,
    pub max_delay: f64,
    pub max_input_length: usize,
    pub connection_timeout: Duration,
    pub tcp_keepalive: bool,
}

impl From<&Config> for TarpitSettings {
    fn from(config: &Config) -> Self {
        Self {
            ssh_banner: config.ssh_banner.clone(),
            banner_delay: Duration::from_secs_f64(config.banner_delay),
            initial_delay: config.initial_delay,
            delay_increment: config.delay_increment,
            max_delay: config.max_delay,
            max_input_length: config.max_input_length,
            connection_timeout: Duration::from_secs(config.connection_timeout),
            tcp_keepalive: config.tcp_keepalive,
        }
    }
}

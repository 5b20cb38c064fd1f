use super::types::ConfigFile;
use crate::error_handling::types::ConfigError;
use log::LevelFilter;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration structure that defines all runtime parameters.
///
/// The structure is deserialized with `toml` from the `[honeypot]` table of the configuration
/// file. Every field has a compiled default so a partial file only overrides what it names.
///
/// # Fields Overview
///
/// - `port`: TCP port the fake SSH endpoint listens on (all interfaces)
/// - `max_connections`: listen backlog, it bounds pending connections only
/// - `ssh_banner`: greeting trickled to every client, without the trailing CR-LF
/// - `banner_delay`: seconds slept after each banner character
/// - `initial_delay`, `delay_increment`, `max_delay`: adaptive per-source delay policy, in
/// seconds
/// - `log_file`, `log_level`, `max_log_size`, `log_backup_count`: logging backend settings
/// - `max_input_length`: number of bytes of client input logged before truncating
/// - `connection_timeout`: seconds bounding every read and write on a client socket
/// - `enable_http_stats`, `http_stats_port`: optional JSON statistics endpoint
/// - `tcp_keepalive`: enables `SO_KEEPALIVE` on the listening and accepted sockets
///
/// # Examples
///
/// ```no_run
/// use deadlockssh::configuration::Config;
/// use std::path::Path;
///
/// let config = Config::from_file(Path::new("deadlockssh.toml")).unwrap_or_default();
/// println!("Listening on port {}", config.port);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub max_connections: u32,
    pub ssh_banner: String,
    pub banner_delay: f64,
    pub initial_delay: f64,
    pub delay_increment: f64,
    pub max_delay: f64,
    pub log_file: PathBuf,
    pub log_level: String,
    pub max_log_size: u64,
    pub log_backup_count: usize,
    pub max_input_length: usize,
    pub connection_timeout: u64,
    pub enable_http_stats: bool,
    pub http_stats_port: u16,
    pub tcp_keepalive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 2222,
            max_connections: 100,
            ssh_banner: String::from("SSH-2.0-OpenSSH_8.9p1 Ubuntu-3ubuntu0.1"),
            banner_delay: 0.1,
            initial_delay: 1.0,
            delay_increment: 2.0,
            max_delay: 60.0,
            log_file: PathBuf::from("honeypot.log"),
            log_level: String::from("INFO"),
            max_log_size: 10 * 1024 * 1024,
            log_backup_count: 5,
            max_input_length: 1024,
            connection_timeout: 300,
            enable_http_stats: false,
            http_stats_port: 8080,
            tcp_keepalive: true,
        }
    }
}

impl Config {
    /// Reads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::IoError` if the file cannot be read
    /// - `ConfigError::TomlError` if the content is not valid TOML or has mistyped values
    /// - `ConfigError::NotInRange` if a value is outside its accepted range
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        file.honeypot.validate()?;
        Ok(file.honeypot)
    }

    /// Loads the configuration without ever failing.
    ///
    /// Without a path the defaults are returned. When the file is unreadable, malformed or out
    /// of range the defaults are returned together with the error, so the caller can report it
    /// once logging is up.
    pub fn load(path: Option<&Path>) -> (Self, Option<ConfigError>) {
        match path {
            None => (Self::default(), None),
            Some(p) => match Self::from_file(p) {
                Ok(config) => (config, None),
                Err(e) => (Self::default(), Some(e)),
            },
        }
    }

    /// Applies the command-line port, which always wins over the file.
    pub fn with_port_override(mut self, port: Option<u16>) -> Self {
        if let Some(p) = port {
            self.port = p;
        }
        self
    }

    /// Maps `log_level` to a `log` filter. `WARNING` is accepted as an alias of `WARN`.
    pub fn log_level_filter(&self) -> Option<LevelFilter> {
        match self.log_level.to_ascii_uppercase().as_str() {
            "ERROR" | "CRITICAL" => Some(LevelFilter::Error),
            "WARN" | "WARNING" => Some(LevelFilter::Warn),
            "INFO" => Some(LevelFilter::Info),
            "DEBUG" => Some(LevelFilter::Debug),
            "TRACE" => Some(LevelFilter::Trace),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let delays = [
            ("banner_delay", self.banner_delay),
            ("initial_delay", self.initial_delay),
            ("delay_increment", self.delay_increment),
            ("max_delay", self.max_delay),
        ];
        for (name, value) in delays {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigError::NotInRange(format!(
                    "{} must be a non-negative, representable number of seconds, got {}",
                    name, value
                )));
            }
        }

        if self.max_connections == 0 {
            return Err(ConfigError::NotInRange(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        if self.max_input_length == 0 {
            return Err(ConfigError::NotInRange(
                "max_input_length must be greater than 0".to_string(),
            ));
        }
        if self.connection_timeout == 0 {
            return Err(ConfigError::NotInRange(
                "connection_timeout must be greater than 0".to_string(),
            ));
        }
        if self.log_level_filter().is_none() {
            return Err(ConfigError::NotInRange(format!(
                "unknown log_level '{}'",
                self.log_level
            )));
        }

        Ok(())
    }
}

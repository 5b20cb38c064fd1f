use serde::Deserialize;

use super::config::Config;

/// On-disk layout of the configuration file.
///
/// Every recognised option lives under a single `[honeypot]` table. A file without that
/// table is valid and yields the compiled defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub honeypot: Config,
}

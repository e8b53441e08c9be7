use std::path::Path;

use config::{Config, File};
use serde::Deserialize;

mod logger;
mod network;
mod services;

pub use logger::LoggerConfig;
pub use network::NetworkConfig;
pub use services::ServicesConfig;

/// Server configuration loaded from a TOML file; every section falls back to
/// its defaults when absent.
#[derive(Deserialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub logger: LoggerConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub services: ServicesConfig,
}

impl ServerConfig {
    pub fn from_path(path: &Path) -> eyre::Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

use serde::{Deserialize, Serialize};

use crate::{common::types::AnyResult, configs::*};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub watchers: WatcherConfig,
    #[serde(default)]
    pub voters: VoterConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_toml_str(config_str: &str) -> AnyResult<Self> {
        let config: Config = toml::from_str(config_str)?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> AnyResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(format!("{} not found", path.display()).into());
        }

        tracing::info!("Loading configuration from: {}", path.display());

        let config_str = std::fs::read_to_string(path)?;
        Self::from_toml_str(&config_str)
    }
}

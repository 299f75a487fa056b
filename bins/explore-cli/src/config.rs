//! TOML configuration file loading, layered over `ExplorationConfig`'s
//! built-in defaults.

use std::path::Path;

use anyhow::Result;
use tracing::warn;
use types::ExplorationConfig;

pub fn load(path: &Path) -> Result<ExplorationConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: ExplorationConfig = toml::from_str(&content)?;
        Ok(config)
    } else {
        warn!(path = %path.display(), "config file not found, using defaults");
        Ok(ExplorationConfig::default())
    }
}

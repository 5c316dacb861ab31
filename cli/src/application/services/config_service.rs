//! Application service: configuration use-cases.

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::domain::config::ReclaimConfig;

/// Load configuration.
pub fn load_config(store: &impl ConfigStore) -> Result<ReclaimConfig> {
    store.load()
}

/// Validate and persist a single setting. Returns the updated configuration.
pub fn set_value(store: &impl ConfigStore, key: &str, value: &str) -> Result<ReclaimConfig> {
    let mut config = store.load()?;
    config.set(key, value)?;
    store.save(&config)?;
    Ok(config)
}

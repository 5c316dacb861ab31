//! Infrastructure implementation of the `ConfigStore` port.
//!
//! The config lives in `~/.reclaim/config.yaml` unless `RECLAIM_CONFIG` names
//! another file. Saves go through a temp file and a rename, and the result is
//! mode 600 since it may hold the gateway API key.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::domain::config::{ReclaimConfig, validate_config_value};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "RECLAIM_CONFIG";

/// Keys re-checked on load; a hand-edited file must still hold valid values.
const CHECKED_ON_LOAD: &[&str] = &[
    "gateway.region",
    "lifecycle.state_namespace",
];

/// YAML file store.
pub struct YamlConfigStore;

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<ReclaimConfig> {
        let path = self.path()?;
        if !path.exists() {
            return Ok(ReclaimConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let config: ReclaimConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", path.display()))?;
        for key in CHECKED_ON_LOAD {
            if let Some(value) = config.display_value(key) {
                validate_config_value(key, &value)
                    .with_context(|| format!("invalid {}", path.display()))?;
            }
        }
        Ok(config)
    }

    fn save(&self, config: &ReclaimConfig) -> Result<()> {
        let path = self.path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let content = serde_yaml::to_string(config).context("cannot serialize config")?;
        write_private(&path, &content)
    }

    fn path(&self) -> Result<PathBuf> {
        if let Some(val) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(val));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join(".reclaim").join("config.yaml"))
    }
}

/// Write `content` to `path` via `<path>.tmp`, owner read/write only.
fn write_private(path: &Path, content: &str) -> Result<()> {
    let temp = path.with_extension("yaml.tmp");
    std::fs::write(&temp, content).with_context(|| format!("cannot write {}", temp.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("cannot set permissions on {}", temp.display()))?;
    }

    std::fs::rename(&temp, path).with_context(|| format!("cannot replace {}", path.display()))
}

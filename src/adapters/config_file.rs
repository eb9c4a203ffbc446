//! JSON configuration file adapter.
//!
//! Implements [`ConfigPort`] on a single JSON file.  A missing file loads
//! as [`SystemConfig::default()`]; a file that parses but fails
//! [`SystemConfig::validate`] is rejected rather than clamped.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse and validate a JSON document.
pub fn parse_config(text: &str) -> Result<SystemConfig, ConfigError> {
    let cfg: SystemConfig = serde_json::from_str(text).map_err(|e| {
        warn!("config: {e}");
        ConfigError::Corrupted
    })?;
    cfg.validate()?;
    Ok(cfg)
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                let cfg = parse_config(&text)?;
                info!("JsonConfigFile: loaded {}", self.path.display());
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "JsonConfigFile: {} not found, using defaults",
                    self.path.display()
                );
                Ok(SystemConfig::default())
            }
            Err(e) => {
                warn!("JsonConfigFile: reading {} failed: {e}", self.path.display());
                Err(ConfigError::IoError)
            }
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let text = serde_json::to_string_pretty(config).map_err(|_| ConfigError::IoError)?;
        std::fs::write(&self.path, text).map_err(|e| {
            warn!("JsonConfigFile: writing {} failed: {e}", self.path.display());
            ConfigError::IoError
        })?;
        info!("JsonConfigFile: saved {}", self.path.display());
        Ok(())
    }
}

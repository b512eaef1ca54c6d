//! Beacon Configuration
//!
//! Round timing and logging settings, loaded from and saved to JSON files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bignum::BLOCK_SIZE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Config not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    /// Seconds from `start` until the commit window closes.
    pub commit_duration: u64,
    /// Seconds from `start` until the reveal window closes.
    pub commit_reveal_duration: u64,
    /// Byte granularity of encoded big numbers.
    pub block_size: usize,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            commit_duration: 120,
            commit_reveal_duration: 240,
            block_size: BLOCK_SIZE,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl BeaconConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.commit_duration == 0 {
            return Err(ConfigError::Invalid("commit_duration must be greater than 0".to_string()));
        }
        if self.commit_reveal_duration <= self.commit_duration {
            return Err(ConfigError::Invalid(
                "commit_reveal_duration must exceed commit_duration".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(ConfigError::Invalid("block_size must be greater than 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_is_valid() {
        let cfg = BeaconConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.block_size, 32);
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("beacon.json");
        let cfg = BeaconConfig { commit_duration: 30, log_json: true, ..Default::default() };
        cfg.save(&path).unwrap();
        assert_eq!(BeaconConfig::load(&path).unwrap(), cfg);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beacon.json");
        fs::write(&path, r#"{ "log_level": "debug" }"#).unwrap();
        let cfg = BeaconConfig::load(&path).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.commit_reveal_duration, 240);
    }

    #[test]
    fn rejects_bad_files() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            BeaconConfig::load(&dir.path().join("absent.json")),
            Err(ConfigError::NotFound(_))
        ));

        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(BeaconConfig::load(&path), Err(ConfigError::Parse(_))));

        fs::write(&path, r#"{ "commit_duration": 50, "commit_reveal_duration": 50 }"#).unwrap();
        assert!(matches!(BeaconConfig::load(&path), Err(ConfigError::Invalid(_))));
    }
}

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::placement::WindowMode;

pub const CONFIG_ENV_VAR: &str = "POPOUT_CONFIG";

const DEFAULT_REAP_INTERVAL_SECS: u64 = 60;
const DEFAULT_STALE_TTL_SECS: u64 = 8 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read popout config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Values applied to any open option the caller leaves unset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WindowDefaults {
    pub mode: WindowMode,
    pub width: u32,
    pub height: u32,
    pub hide_header: bool,
    pub hide_aside: bool,
}

impl Default for WindowDefaults {
    fn default() -> Self {
        Self {
            mode: WindowMode::Create,
            width: 1280,
            height: 720,
            hide_header: true,
            hide_aside: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub reap_interval_secs: u64,
    pub stale_ttl_secs: u64,
    pub defaults: WindowDefaults,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            reap_interval_secs: DEFAULT_REAP_INTERVAL_SECS,
            stale_ttl_secs: DEFAULT_STALE_TTL_SECS,
            defaults: WindowDefaults::default(),
        }
    }
}

impl ManagerConfig {
    /// Loads the config from `config_path`, falling back to defaults when no
    /// path is given or the file does not exist.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                serde_yaml::from_str(&contents)?
            }
            _ => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads the path from `POPOUT_CONFIG`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    pub fn stale_ttl(&self) -> Duration {
        Duration::from_secs(self.stale_ttl_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.reap_interval_secs == 0 {
            return Err(ConfigError::Zero("reap_interval_secs"));
        }
        if self.stale_ttl_secs == 0 {
            return Err(ConfigError::Zero("stale_ttl_secs"));
        }
        if self.defaults.width == 0 || self.defaults.height == 0 {
            return Err(ConfigError::Zero("default window size"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_default() {
        let config = ManagerConfig::load(None).unwrap();
        assert_eq!(config.reap_interval(), Duration::from_secs(60));
        assert_eq!(config.stale_ttl(), Duration::from_secs(28_800));
        assert_eq!(config.defaults.width, 1280);
        assert!(config.defaults.hide_header);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ManagerConfig::load(Some(PathBuf::from("/nonexistent/popout.yaml"))).unwrap();
        assert_eq!(config, ManagerConfig::default());
    }

    #[test]
    fn loads_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "stale_ttl_secs: 120\ndefaults:\n  width: 900\n  mode: edit"
        )
        .unwrap();
        let config = ManagerConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.stale_ttl_secs, 120);
        assert_eq!(config.reap_interval_secs, 60);
        assert_eq!(config.defaults.width, 900);
        assert_eq!(config.defaults.height, 720);
        assert_eq!(config.defaults.mode, WindowMode::Edit);
    }

    #[test]
    fn rejects_zero_interval() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "reap_interval_secs: 0").unwrap();
        let err = ManagerConfig::load(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::Zero("reap_interval_secs")));
    }
}

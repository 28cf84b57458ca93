use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from lifeline.toml.
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LifelineConfig {
    pub shutdown: ShutdownConfig,
    pub update: UpdateConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Hook SIGINT/SIGTERM and close the main view instead of dying.
    pub intercept: bool,
    /// Keep swallowing stop requests even when no main view is set.
    pub swallow_without_view: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpdateConfig {
    /// Where the published version manifest lives (JSON).
    pub manifest_url: Option<String>,
    pub timeout_secs: u64,
    /// Run one update check in the background when `run` starts.
    pub check_on_start: bool,
}

// --- Default implementations ---

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            intercept: true,
            swallow_without_view: false,
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            manifest_url: None,
            timeout_secs: 10,
            check_on_start: false,
        }
    }
}

/// Errors from loading the config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Load config from `path`. A missing file yields the defaults.
pub fn load(path: &Path) -> Result<LifelineConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(LifelineConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

//! Configuration loading and parsing

use anyhow::{Context, Result};
use led_frame_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration (loaded from a TOML file)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub inspect: InspectConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    pub control: Option<PathBuf>,
    pub frames: Option<PathBuf>,
}

/// Settings for the sequential `dump` scan
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InspectConfig {
    /// Print every Nth frame
    #[serde(default = "default_every")]
    pub every: usize,
    #[serde(default)]
    pub max_frames: Option<usize>,
}

fn default_every() -> usize {
    100
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            every: default_every(),
            max_frames: None,
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    if config.inspect.every == 0 {
        anyhow::bail!("inspect.every must be at least 1 in {:?}", path);
    }

    Ok(config)
}

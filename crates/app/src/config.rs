use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tally_engine::EngineConfig;

const CONFIG_FILE: &str = "config.toml";
const DB_FILE: &str = "tally.db";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).context("Failed to parse config")?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Reads `path`, or the default location when `None`. A missing file
    /// yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match project_dirs() {
                Some(dirs) => dirs.config_dir().join(CONFIG_FILE),
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(p) = &self.database_path {
            return Ok(p.clone());
        }
        let dirs = project_dirs().context("Failed to get app directory")?;
        Ok(dirs.data_dir().join(DB_FILE))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "tally", "tally")
}

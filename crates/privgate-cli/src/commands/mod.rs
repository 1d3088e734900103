//! CLI command implementations.

pub mod check;
pub mod config;
pub mod decide;
pub mod render;
pub mod version;

use std::path::PathBuf;

use anyhow::{Context, Result};
use privgate::{EngineSettings, PolicyRegistry};
use privgate_config::{ConfigLoader, PrivgateConfig};

/// Where configuration comes from: a layered project directory, or one file.
pub struct ConfigSource {
    project: PathBuf,
    file: Option<PathBuf>,
}

impl ConfigSource {
    pub fn new(project: PathBuf, file: Option<PathBuf>) -> Self {
        Self { project, file }
    }

    pub fn load(&self) -> Result<PrivgateConfig> {
        match &self.file {
            Some(path) => PrivgateConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load {}", path.display())),
            None => ConfigLoader::new()
                .with_project_dir(&self.project)
                .load()
                .context("Failed to load configuration"),
        }
    }

    /// Loads configuration and registers every policy in it.
    pub fn load_registry(&self) -> Result<(PrivgateConfig, PolicyRegistry, EngineSettings)> {
        let config = self.load()?;
        let registry =
            PolicyRegistry::from_config(&config).context("Invalid policy configuration")?;
        let settings = EngineSettings::from_config(&config);
        Ok((config, registry, settings))
    }
}

/// Parses `NAME=VALUE`.
pub fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing name in '{raw}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

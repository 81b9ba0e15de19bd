//! Configuration management for Dripfeed
//!
//! Targets are pure data: an identifier, a posting interval and an ordered
//! list of constraint plugin configurations. There is no per-target code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub content: ContentConfig,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Root folder whose subdirectories are post sources.
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Days between automatic posts on this target.
    #[serde(default = "default_interval_days")]
    pub interval_days: i64,

    /// Ordered constraint pipeline. Each entry names a registered plugin
    /// and carries free-form settings merged over the plugin's defaults.
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

fn default_interval_days() -> i64 {
    7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    pub id: String,
    #[serde(default)]
    pub settings: serde_json::Value,
}

/// A publishing destination, resolved from configuration.
#[derive(Debug, Clone)]
pub struct Target {
    pub id: String,
    pub interval_days: i64,
    pub plugins: Vec<PluginConfig>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Expanded content root path.
    pub fn content_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.content.root).to_string())
    }

    /// Resolve one configured target by id.
    pub fn target(&self, id: &str) -> Result<Target> {
        let cfg = self
            .targets
            .get(id)
            .ok_or_else(|| ConfigError::UnknownTarget(id.to_string()))?;
        Ok(Target {
            id: id.to_string(),
            interval_days: cfg.interval_days,
            plugins: cfg.plugins.clone(),
        })
    }

    /// All configured targets, in stable (alphabetical) order.
    pub fn all_targets(&self) -> Vec<Target> {
        self.targets
            .iter()
            .map(|(id, cfg)| Target {
                id: id.clone(),
                interval_days: cfg.interval_days,
                plugins: cfg.plugins.clone(),
            })
            .collect()
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        let mut targets = BTreeMap::new();
        targets.insert(
            "mastodon".to_string(),
            TargetConfig {
                interval_days: 7,
                plugins: vec![
                    PluginConfig {
                        id: "limit_files".to_string(),
                        settings: serde_json::json!({ "image_max": 4 }),
                    },
                    PluginConfig {
                        id: "image_size".to_string(),
                        settings: serde_json::json!({ "max_width": 1920, "max_size": 8_000_000 }),
                    },
                ],
            },
        );
        Self {
            content: ContentConfig {
                root: "~/dripfeed/content".to_string(),
            },
            targets,
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("DRIPFEED_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("dripfeed").join("config.toml"))
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default = "default_forwarding_config")]
    pub forwarding: ForwardingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Users allowed to run /debug* commands in a private chat.
    /// Empty means any private chat may use them.
    #[serde(default)]
    pub operator_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForwardingConfig {
    #[serde(default = "default_rules_path")]
    pub rules_path: PathBuf,
}

fn default_rules_path() -> PathBuf {
    PathBuf::from("forwarding_rules.json")
}

fn default_forwarding_config() -> ForwardingConfig {
    ForwardingConfig {
        rules_path: default_rules_path(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}

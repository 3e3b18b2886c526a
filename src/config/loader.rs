use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::Config;
use crate::utils::siphon_home;

pub fn get_config_path() -> Result<PathBuf> {
    Ok(siphon_home()?.join("config.json"))
}

/// Loads configuration from `config_path`, or the default location when
/// `None`. A missing file means the stock configuration; a present but
/// malformed file is an error rather than a silent fallback.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let default_path = get_config_path().unwrap_or_else(|_| PathBuf::from("config.json"));
    let path = config_path.unwrap_or(default_path.as_path());

    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config JSON from {}", path.display()))?;
        return Ok(config);
    }

    Ok(Config::default())
}

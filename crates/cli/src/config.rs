//! Configuration file loading for the CLI

use anyhow::{Context, Result};
use std::path::Path;

use rapidsift_filters::CurationConfig;

/// Load a curation config from YAML, TOML, or JSON, keyed on extension.
pub fn load_config(path: &Path) -> Result<CurationConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let config: CurationConfig = match extension {
        "yaml" | "yml" => serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse YAML config {}", path.display()))?,
        "toml" => toml::from_str(&content)
            .with_context(|| format!("failed to parse TOML config {}", path.display()))?,
        "json" => serde_json::from_str(&content)
            .with_context(|| format!("failed to parse JSON config {}", path.display()))?,
        other => anyhow::bail!(
            "unsupported config format '{other}': use .yaml, .yml, .toml, or .json"
        ),
    };

    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

/// Write a config template for users to start from.
pub fn save_config(config: &CurationConfig, path: &Path) -> Result<()> {
    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    let content = match extension {
        "yaml" | "yml" => serde_yaml::to_string(config)?,
        "toml" => toml::to_string_pretty(config)?,
        "json" => serde_json::to_string_pretty(config)?,
        other => anyhow::bail!("unsupported config format '{other}'"),
    };
    std::fs::write(path, content)
        .with_context(|| format!("failed to write config file {}", path.display()))?;
    Ok(())
}

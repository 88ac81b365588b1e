use anyhow::{Context, Result, anyhow};
use shared::SweepConfig;
use std::path::Path;

/// Load the TOML config at `path`; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<SweepConfig> {
    if !path.exists() {
        log::info!("No config at {}, using defaults", path.display());
        return Ok(SweepConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = SweepConfig::from_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(config)
}

//! Configuration file loading

use std::path::Path;

use anyhow::Context;
use xroute_core::AggregatorConfig;

/// Read and validate a JSON configuration file
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<AggregatorConfig> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("Invalid config file {}", path.display()))
}

pub fn parse_config(raw: &str) -> anyhow::Result<AggregatorConfig> {
    let config: AggregatorConfig = serde_json::from_str(raw).context("Malformed JSON")?;
    config.validate()?;
    tracing::debug!(
        thorchain = config.thorchain.is_some(),
        mayachain = config.mayachain.is_some(),
        chainflip = config.chainflip.is_some(),
        "Loaded configuration"
    );
    Ok(config)
}

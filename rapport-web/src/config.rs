use std::path::PathBuf;

use serde::Deserialize;

/// Rapport configuration read from `~/.config/rapport/config.toml`.
///
/// Without a `convex_url` the server runs against the in-memory store,
/// which is enough for local development.
#[derive(Debug, Deserialize, Default)]
pub struct RapportConfig {
    pub convex_url: Option<String>,
    pub bind_addr: Option<String>,
    /// "lock_on_validate" (default) or "keep_editable".
    pub validation_policy: Option<String>,
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .expect("Could not determine config directory")
        .join("rapport")
        .join("config.toml")
}

pub fn load_config() -> anyhow::Result<RapportConfig> {
    let path = config_path();
    if !path.exists() {
        return Ok(RapportConfig::default());
    }
    let content = std::fs::read_to_string(&path)?;
    let config: RapportConfig = toml::from_str(&content)?;
    Ok(config)
}

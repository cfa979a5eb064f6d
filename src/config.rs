use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Load a script configuration document. Its shape is never checked beyond YAML parsing.
pub fn load_config(path: &Path) -> anyhow::Result<serde_yaml::Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
    let v: serde_yaml::Value = serde_yaml::from_str(&content).with_context(|| format!("failed to parse YAML {:?}", path))?;
    Ok(v)
}

/// Single-line rendering of a configuration tree for console output
pub fn render_config(config: &serde_yaml::Value) -> String {
    // JSON cannot express every YAML key (e.g. sequences as keys)
    serde_json::to_string(config).unwrap_or_else(|_| format!("{:?}", config))
}

/// Settings for `drive`: which script to run and what to hand it
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DriveConfig {
    /// Shell command that runs the script; lifecycle arguments are appended to it
    pub run: String,
    #[serde(default = "empty_mapping")]
    pub config: serde_yaml::Value,
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub timeout: Option<u64>, // seconds
}

fn empty_mapping() -> serde_yaml::Value {
    serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
}

pub fn load_drive_config(path: &Path) -> anyhow::Result<DriveConfig> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
    let c: DriveConfig = serde_yaml::from_str(&content).with_context(|| format!("failed to parse YAML {:?}", path))?;
    if c.run.trim().is_empty() {
        anyhow::bail!("'run' must name the script command in {:?}", path);
    }
    Ok(c)
}

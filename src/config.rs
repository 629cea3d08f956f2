use crate::error::OutlineError;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{read_to_string, write},
    path::PathBuf,
};

/// Default number of levels fetched below a pulled thought.
pub const DEFAULT_MAX_DEPTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineConfig {
    /// Levels fetched per pull below each requested thought. The settings root ignores it.
    pub max_depth: usize,
    /// Delay before a burst of edits to one thought is committed.
    pub edit_throttle_ms: u64,
    /// How long alerts stay visible before auto-dismissal.
    pub alert_duration_ms: u64,
    pub schema_version: u32,
    /// Fixed session id. A random one is generated when unset.
    pub session_id: Option<String>,
    /// Number of pull rounds allowed when loading a subtree before a cascading delete.
    pub delete_pull_cutoff: usize,
    /// How long a deletion is remembered after it has been pushed.
    pub tombstone_ttl_ms: u64,
}

impl Default for OutlineConfig {
    fn default() -> Self {
        OutlineConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            edit_throttle_ms: 1000,
            alert_duration_ms: 2000,
            schema_version: crate::properties::SCHEMA_LATEST,
            session_id: None,
            delete_pull_cutoff: 10,
            tombstone_ttl_ms: 60_000,
        }
    }
}

pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<OutlineConfig, OutlineError>;
    fn set_config(&self, config: &OutlineConfig) -> Result<(), OutlineError>;
}

/// Reads and writes the `[outline]` table of a TOML file.
#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<OutlineConfig, OutlineError> {
        tracing::debug!("Attempting to read config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(OutlineConfig::default());
        }
        let content = read_to_string(&self.path)?;
        let mut config: BTreeMap<String, OutlineConfig> = toml::from_str(&content)?;
        Ok(config.remove("outline").unwrap_or_default())
    }

    fn set_config(&self, config: &OutlineConfig) -> Result<(), OutlineError> {
        tracing::debug!("Attempting to write config to: {:?}", &self.path);
        let mut table = BTreeMap::new();
        table.insert("outline".to_string(), config.clone());
        let toml_string = toml::to_string(&table)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let provider = TomlConfigProvider::new(dir.path().join("missing.toml"));
        assert_eq!(provider.get_config().unwrap(), OutlineConfig::default());
    }

    #[test]
    fn test_partial_table_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("outline.toml");
        std::fs::write(&path, "[outline]\nmax_depth = 3\nsession_id = \"abc\"\n").unwrap();
        let config = TomlConfigProvider::new(path).get_config().unwrap();
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.session_id.as_deref(), Some("abc"));
        assert_eq!(config.edit_throttle_ms, OutlineConfig::default().edit_throttle_ms);
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let provider = TomlConfigProvider::new(dir.path().join("outline.toml"));
        let config = OutlineConfig {
            max_depth: 7,
            alert_duration_ms: 10,
            ..Default::default()
        };
        provider.set_config(&config).unwrap();
        assert_eq!(provider.get_config().unwrap(), config);
    }
}

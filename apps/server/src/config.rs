use anyhow::{bail, Context, Result};
use gm_ai::BackendConfig;
use gm_runtime::RuntimeConfig;
use persistence::{default_local_path, default_sqlite_url};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Which store requests go to. `Cloud` is the SQLite document table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageMode {
    #[default]
    Local,
    Cloud,
}

impl StorageMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageMode::Local => "LOCAL",
            StorageMode::Cloud => "CLOUD",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOCAL" => Ok(StorageMode::Local),
            "CLOUD" => Ok(StorageMode::Cloud),
            other => bail!("unknown storage mode {other:?}; expected LOCAL or CLOUD"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub mode: StorageMode,
    pub local_path: String,
    pub sqlite_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::default(),
            local_path: default_local_path().to_string(),
            sqlite_url: default_sqlite_url().to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Capacity of each streamed round's event channel.
    pub stream_buffer: usize,
    pub backend: BackendConfig,
    pub storage: StorageConfig,
    pub runtime: RuntimeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            stream_buffer: 256,
            backend: BackendConfig::default(),
            storage: StorageConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read a YAML file; without a path every field takes its default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_mode_parses_case_insensitively() {
        assert_eq!("cloud".parse::<StorageMode>().unwrap(), StorageMode::Cloud);
        assert_eq!(" LOCAL ".parse::<StorageMode>().unwrap(), StorageMode::Local);
        assert!("REMOTE".parse::<StorageMode>().is_err());
        assert_eq!(StorageMode::Cloud.to_string(), "CLOUD");
    }

    #[test]
    fn yaml_overrides_only_what_it_names() {
        let cfg = ServerConfig::from_yaml(
            "bind: 127.0.0.1:9000\nstorage:\n  mode: CLOUD\nbackend:\n  model: deepseek-chat\n",
        )
        .unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:9000");
        assert_eq!(cfg.storage.mode, StorageMode::Cloud);
        assert_eq!(cfg.storage.local_path, default_local_path());
        assert_eq!(cfg.backend.model, "deepseek-chat");
        assert_eq!(cfg.backend.base_url, BackendConfig::default().base_url);
        assert_eq!(cfg.runtime, RuntimeConfig::default());
    }

    #[test]
    fn bundled_config_parses() {
        let text = include_str!("../../../config/server.yaml");
        let cfg = ServerConfig::from_yaml(text).unwrap();
        assert_eq!(cfg.runtime.roster.subordinates().len(), 2);
        assert_eq!(cfg.runtime.schema.resources.len(), 4);
    }
}

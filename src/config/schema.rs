use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct CacheConfig {
    /// Cache root (HF_HOME). When unset, the HF_HOME environment
    /// variable is used, then `~/.cache/huggingface`.
    pub root: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SyncConfig {
    /// Concurrent acquisition workers for batch downloads
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-entry acquisition timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum free disk space required before a batch starts
    #[serde(default = "default_min_free_mb")]
    pub min_free_mb: u64,
}

// Default value functions
fn default_workers() -> usize {
    4
}
fn default_timeout_secs() -> u64 {
    3600
}
fn default_min_free_mb() -> u64 {
    1024
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout_secs: default_timeout_secs(),
            min_free_mb: default_min_free_mb(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Config {
    /// Load config from the user config file, or defaults if absent
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map_err(|e| CacheError::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Config file path: `$XDG_CONFIG_HOME/hfcache/config.toml`
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config)
        } else {
            let home = std::env::var("HOME")
                .map_err(|_| CacheError::Config("HOME env var not set".to_string()))?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("hfcache").join("config.toml"))
    }

    /// Resolve the cache root.
    ///
    /// Order: explicit config value, then the HF_HOME environment
    /// variable, then `~/.cache/huggingface`.
    pub fn resolve_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.cache.root {
            return Ok(root.clone());
        }

        if let Ok(hf_home) = std::env::var("HF_HOME") {
            if !hf_home.is_empty() {
                return Ok(PathBuf::from(hf_home));
            }
        }

        dirs::home_dir()
            .map(|h| h.join(".cache/huggingface"))
            .ok_or_else(|| {
                CacheError::Config(
                    "Cannot determine cache root: set cache.root in config.toml or HF_HOME"
                        .to_string(),
                )
            })
    }
}

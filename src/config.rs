use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub service: ServiceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
  /// Where the cache database lives (defaults to the platform data dir)
  pub path: Option<PathBuf>,
  /// Disable to keep the cache purely in memory
  #[serde(default = "default_persist")]
  pub persist: bool,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      path: None,
      persist: default_persist(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Freshness window for cached reads, in minutes
  #[serde(default = "default_stale_minutes")]
  pub stale_minutes: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_minutes: default_stale_minutes(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Simulated latency of the stub backend, in milliseconds
  #[serde(default = "default_latency_ms")]
  pub latency_ms: u64,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      latency_ms: default_latency_ms(),
    }
  }
}

fn default_persist() -> bool {
  true
}

fn default_stale_minutes() -> i64 {
  5
}

fn default_latency_ms() -> u64 {
  250
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./crmcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/crmcache/config.yaml
  ///
  /// With no file anywhere, defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("crmcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("crmcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Freshness window as a chrono duration.
  pub fn stale_time(&self) -> chrono::Duration {
    chrono::Duration::minutes(self.cache.stale_minutes)
  }

  /// Stub backend latency as a std duration.
  pub fn latency(&self) -> std::time::Duration {
    std::time::Duration::from_millis(self.service.latency_ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_apply_without_a_file() {
    let config = Config::default();
    assert!(config.storage.persist);
    assert_eq!(config.cache.stale_minutes, 5);
    assert_eq!(config.service.latency_ms, 250);
  }

  #[test]
  fn partial_yaml_keeps_remaining_defaults() {
    let config: Config = serde_yaml::from_str("cache:\n  stale_minutes: 1\n").unwrap();
    assert_eq!(config.cache.stale_minutes, 1);
    assert!(config.storage.persist);
    assert_eq!(config.service.latency_ms, 250);
  }

  #[test]
  fn explicit_missing_path_is_an_error() {
    assert!(Config::load(Some(Path::new("/nonexistent/crmcache.yaml"))).is_err());
  }
}

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::agent::AgentSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Label of the deployed build; every store with another label is garbage
  pub generation: String,
  /// URL the app is served from; relative asset entries resolve against it
  pub scope: String,
  /// Resources that must be available offline
  #[serde(default)]
  pub assets: Vec<String>,
  /// Host of the remote data API, served network-first
  pub remote_data_host: String,
  #[serde(default)]
  pub network: NetworkConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
  /// Upper bound for a single network attempt
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  pub user_agent: Option<String>,
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self {
      timeout_secs: default_timeout_secs(),
      user_agent: None,
    }
  }
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Database file (default: $XDG_DATA_HOME/offcache/cache.db)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
  /// Write logs here instead of stderr
  pub file: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./offcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/offcache/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/offcache/config.yaml \
         or pass --config."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("offcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("offcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;

    check_generation(&config.generation)?;
    if config.remote_data_host.trim().is_empty() {
      return Err(eyre!("remote_data_host must not be empty"));
    }

    Ok(config)
  }

  /// Replace the configured generation label, e.g. from the command line.
  pub fn with_generation(self, generation: String) -> Result<Self> {
    check_generation(&generation)?;
    Ok(Self { generation, ..self })
  }

  /// Engine settings, with asset entries resolved against the scope URL.
  pub fn agent_settings(&self) -> Result<AgentSettings> {
    let scope =
      Url::parse(&self.scope).map_err(|e| eyre!("Invalid scope URL '{}': {}", self.scope, e))?;

    let manifest = self
      .assets
      .iter()
      .map(|entry| {
        scope
          .join(entry)
          .map_err(|e| eyre!("Invalid asset URL '{}': {}", entry, e))
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(AgentSettings {
      generation: self.generation.clone(),
      manifest,
      remote_data_host: self.remote_data_host.to_ascii_lowercase(),
    })
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.network.timeout_secs)
  }

  /// Get the database path.
  pub fn store_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.storage.path {
      return Ok(path.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("offcache").join("cache.db"))
  }

  /// Activation state lives next to the database.
  pub fn state_path(&self) -> Result<PathBuf> {
    Ok(self.store_path()?.with_file_name("state.json"))
  }
}

fn check_generation(label: &str) -> Result<()> {
  if label.trim().is_empty() {
    return Err(eyre!("generation must not be empty"));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  const MINIMAL: &str = r#"
generation: qualito-v6
scope: https://app.example.org/eau/
remote_data_host: hubeau.eaufrance.fr
"#;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse(MINIMAL).unwrap();

    assert_eq!(config.generation, "qualito-v6");
    assert!(config.assets.is_empty());
    assert_eq!(config.timeout(), Duration::from_secs(30));
    assert!(config.storage.path.is_none());
    assert!(config.logging.file.is_none());
  }

  #[test]
  fn test_assets_resolve_against_scope() {
    let yaml = format!(
      "{}assets:\n  - ./\n  - ./eau-qualite.html\n  - /favicon.ico\n  - https://cdn.example.org/lib.js\n",
      MINIMAL
    );
    let settings = Config::parse(&yaml).unwrap().agent_settings().unwrap();

    let urls: Vec<&str> = settings.manifest.iter().map(|u| u.as_str()).collect();
    assert_eq!(
      urls,
      vec![
        "https://app.example.org/eau/",
        "https://app.example.org/eau/eau-qualite.html",
        "https://app.example.org/favicon.ico",
        "https://cdn.example.org/lib.js",
      ]
    );
  }

  #[test]
  fn test_remote_host_is_lowercased() {
    let yaml = MINIMAL.replace("hubeau.eaufrance.fr", "HubEau.EauFrance.fr");
    let settings = Config::parse(&yaml).unwrap().agent_settings().unwrap();
    assert_eq!(settings.remote_data_host, "hubeau.eaufrance.fr");
  }

  #[test]
  fn test_rejects_empty_generation() {
    let yaml = MINIMAL.replace("qualito-v6", "\"\"");
    assert!(Config::parse(&yaml).is_err());
  }

  #[test]
  fn test_generation_override() {
    let config = Config::parse(MINIMAL).unwrap();
    let config = config.with_generation("qualito-v7".to_string()).unwrap();
    assert_eq!(config.agent_settings().unwrap().generation, "qualito-v7");

    assert!(config.clone().with_generation(String::new()).is_err());
    assert!(config.with_generation("  ".to_string()).is_err());
  }

  #[test]
  fn test_rejects_invalid_scope() {
    let yaml = MINIMAL.replace("https://app.example.org/eau/", "not a url");
    assert!(Config::parse(&yaml).unwrap().agent_settings().is_err());
  }

  #[test]
  fn test_state_file_sits_next_to_database() {
    let yaml = format!("{}storage:\n  path: /var/lib/offcache/cache.db\n", MINIMAL);
    let config = Config::parse(&yaml).unwrap();

    assert_eq!(
      config.state_path().unwrap(),
      PathBuf::from("/var/lib/offcache/state.json")
    );
  }

  #[test]
  fn test_load_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offcache.yaml");
    std::fs::write(&path, MINIMAL).unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.remote_data_host, "hubeau.eaufrance.fr");

    assert!(Config::load(Some(&dir.path().join("missing.yaml"))).is_err());
  }
}

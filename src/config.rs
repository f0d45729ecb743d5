//! MPD connection settings and config file loading.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("Failed to read config file: {0}")]
  Io(#[from] std::io::Error),

  #[error("Invalid config JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("Invalid config: {0}")]
  Invalid(String),
}

/// How to reach MPD and what to ask it for.
#[derive(Clone, Deserialize)]
pub struct MpdConfig {
  /// Hostname, or a Unix socket path starting with `/` or `~`.
  #[serde(default = "default_host")]
  pub host: String,

  /// TCP port (ignored for Unix sockets).
  #[serde(default = "default_port")]
  pub port: u16,

  /// Password sent before updating; empty skips authentication.
  #[serde(default)]
  pub password: String,

  /// Rescan only the changed item instead of the whole library.
  #[serde(default)]
  pub granular_update: bool,

  /// Library root that granular update paths are relative to.
  #[serde(default)]
  pub music_directory: Option<PathBuf>,

  /// Upper bound on a whole update session, in seconds.
  #[serde(default)]
  pub timeout_secs: Option<u64>,
}

fn default_host() -> String {
  host_or_default(std::env::var("MPD_HOST").ok().as_deref())
}

fn default_port() -> u16 {
  port_or_default(std::env::var("MPD_PORT").ok().as_deref())
}

fn host_or_default(value: Option<&str>) -> String {
  value
    .filter(|host| !host.is_empty())
    .unwrap_or("localhost")
    .to_string()
}

fn port_or_default(value: Option<&str>) -> u16 {
  match value {
    Some(port) => port.parse().unwrap_or_else(|_| {
      log::warn!("Ignoring invalid MPD_PORT value {:?}", port);
      6600
    }),
    None => 6600,
  }
}

impl Default for MpdConfig {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      password: String::new(),
      granular_update: false,
      music_directory: None,
      timeout_secs: None,
    }
  }
}

impl fmt::Debug for MpdConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MpdConfig")
      .field("host", &self.host)
      .field("port", &self.port)
      .field("password", &self.redacted_password())
      .field("granular_update", &self.granular_update)
      .field("music_directory", &self.music_directory)
      .field("timeout_secs", &self.timeout_secs)
      .finish()
  }
}

impl MpdConfig {
  /// Password as it may appear in logs.
  pub fn redacted_password(&self) -> &'static str {
    if self.password.is_empty() {
      ""
    } else {
      "********"
    }
  }

  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), String> {
    if self.host.trim().is_empty() {
      return Err("MPD host cannot be empty".to_string());
    }
    if self.port == 0 {
      return Err("MPD port must be between 1 and 65535".to_string());
    }
    if self.granular_update && self.music_directory.is_none() {
      return Err("Granular updates need the music directory".to_string());
    }
    if self.timeout_secs == Some(0) {
      return Err("Session timeout must be at least 1 second".to_string());
    }
    Ok(())
  }
}

/// Contents of a config file.
///
/// The `mpd` section holds the settings. Keys of a legacy `mpdupdate`
/// section override it, and a top-level `directory` supplies the music
/// directory when `mpd` names none.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
  pub mpd: MpdConfig,
}

impl AppConfig {
  /// Load configuration from a JSON file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config = Self::from_json(&contents)?;
    log::info!("Loaded config from {}: {:?}", path.display(), config.mpd);
    Ok(config)
  }

  /// Parse configuration from JSON text.
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    let root: Value = serde_json::from_str(json)?;
    let Value::Object(root) = root else {
      return Err(ConfigError::Invalid("top level must be an object".to_string()));
    };

    let mut settings = section(&root, "mpd")?;
    for (key, value) in section(&root, "mpdupdate")? {
      settings.insert(key, value);
    }
    if !settings.contains_key("music_directory") {
      if let Some(directory) = root.get("directory").filter(|v| !v.is_null()) {
        settings.insert("music_directory".to_string(), directory.clone());
      }
    }

    let mpd: MpdConfig = serde_json::from_value(Value::Object(settings))?;
    Ok(Self { mpd })
  }
}

/// Extract a section with its keys normalized to field names.
fn section(root: &Map<String, Value>, name: &str) -> Result<Map<String, Value>, ConfigError> {
  match root.get(name) {
    None | Some(Value::Null) => Ok(Map::new()),
    Some(Value::Object(entries)) => Ok(
      entries
        .iter()
        .map(|(key, value)| (canonical_key(key).to_string(), value.clone()))
        .collect(),
    ),
    Some(_) => Err(ConfigError::Invalid(format!("`{}` must be an object", name))),
  }
}

fn canonical_key(key: &str) -> &str {
  match key {
    "granularupdate" => "granular_update",
    "directory" => "music_directory",
    other => other,
  }
}

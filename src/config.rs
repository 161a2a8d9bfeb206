use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::{Origin, Url};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Prefix for store names and label used in synthesized pages
  #[serde(default = "default_name")]
  pub name: String,
  /// Version tag naming the current cache generation
  pub version: String,
  /// Application origin; relative asset URLs resolve against it
  pub origin: Url,
  /// Requests to this origin are routed to the API strategy
  pub api_origin: Url,
  /// Assets fetched into the core store at install time
  #[serde(default)]
  pub core_assets: Vec<String>,
  /// Document shell paths tried (in order) when a navigation fails
  #[serde(default = "default_shell_paths")]
  pub shell_paths: Vec<String>,
  #[serde(default)]
  pub stores: StoresConfig,
  /// Request activation right after install instead of waiting for old clients
  #[serde(default = "default_skip_waiting")]
  pub skip_waiting: bool,
  /// Optional upper bound on a single network fetch
  pub fetch_timeout_secs: Option<u64>,
  /// SQLite database location (defaults to the user data directory)
  pub storage_path: Option<PathBuf>,
}

/// Generation of each store role. The core store follows the version tag
/// unless pinned explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct StoresConfig {
  pub core: Option<String>,
  #[serde(default = "default_generation")]
  pub images: String,
  #[serde(default = "default_generation")]
  pub api: String,
}

impl Default for StoresConfig {
  fn default() -> Self {
    Self {
      core: None,
      images: default_generation(),
      api: default_generation(),
    }
  }
}

fn default_name() -> String {
  "offgrid".to_string()
}

fn default_shell_paths() -> Vec<String> {
  vec!["/index.html".to_string(), "/".to_string()]
}

fn default_skip_waiting() -> bool {
  true
}

fn default_generation() -> String {
  "1".to_string()
}

impl Config {
  /// Load configuration from `explicit_path`, or from the first config file
  /// found by [`Config::search_paths`].
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = Self::find_config_file(explicit_path)?;
    Self::load_from_path(&path)
  }

  /// An explicit path must exist; it is never replaced by a searched one.
  fn find_config_file(explicit_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
      return path
        .is_file()
        .then(|| path.to_path_buf())
        .ok_or_else(|| eyre!("Config file not found: {}", path.display()));
    }

    let candidates = Self::search_paths();
    candidates
      .iter()
      .find(|path| path.is_file())
      .cloned()
      .ok_or_else(|| {
        let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        eyre!(
          "No configuration file found (tried {}). See offgrid.example.yaml for the format.",
          tried.join(", ")
        )
      })
  }

  /// `./offgrid.yaml`, then `$XDG_CONFIG_HOME/offgrid/config.yaml`.
  pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("offgrid.yaml")];
    paths.extend(dirs::config_dir().map(|dir| dir.join("offgrid").join("config.yaml")));
    paths
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml_str(&contents)
      .map_err(|e| eyre!("Failed to load config file {}: {}", path.display(), e))
  }

  /// Parse and validate a YAML configuration document.
  pub fn from_yaml_str(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.version.trim().is_empty() {
      return Err(eyre!("version must not be empty"));
    }
    if self.name.trim().is_empty() {
      return Err(eyre!("name must not be empty"));
    }
    for asset in self.core_assets.iter().chain(&self.shell_paths) {
      self.resolve(asset)?;
    }
    Ok(())
  }

  /// Resolve a possibly relative URL against the application origin.
  pub fn resolve(&self, raw: &str) -> Result<Url> {
    self
      .origin
      .join(raw)
      .map_err(|e| eyre!("Invalid URL '{}': {}", raw, e))
  }

  pub fn api_origin(&self) -> Origin {
    self.api_origin.origin()
  }

  /// Generation string of the core store.
  pub fn core_generation(&self) -> &str {
    self.stores.core.as_deref().unwrap_or(&self.version)
  }

  pub fn fetch_timeout(&self) -> Option<std::time::Duration> {
    self.fetch_timeout_secs.map(std::time::Duration::from_secs)
  }
}

#[cfg(test)]
pub(crate) const SAMPLE: &str = r#"
name: clashy
version: 2.1.1
origin: https://app.example.com
api_origin: https://api.example.com
core_assets:
  - /
  - /index.html
  - /manifest.json
  - https://cdn.example.net/lib.css
"#;

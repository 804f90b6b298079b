//! Configuration
//!
//! Read from `perspective-sql.toml` in the working directory, falling back
//! to `<config dir>/perspective-sql/config.toml`. Missing files mean
//! defaults; command-line flags override both.
//!
//! ```toml
//! [api]
//! base_url = "https://chapi.cloudhealthtech.com/v1"
//! api_key = "..."
//! timeout_secs = 30
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PerspectiveError, PerspectiveResult};

pub const CONFIG_FILE: &str = "perspective-sql.toml";
pub const DEFAULT_BASE_URL: &str = "https://chapi.cloudhealthtech.com/v1";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
}

/// CloudHealth API settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Used when no key is given on the command line or in the environment
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl Config {
    /// Load from the first config file found, or defaults.
    pub fn load() -> PerspectiveResult<Self> {
        match Self::locate() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from an explicit path.
    pub fn from_file(path: &Path) -> PerspectiveResult<Self> {
        tracing::debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            PerspectiveError::Config(format!("failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> PerspectiveResult<Self> {
        toml::from_str(content).map_err(|e| PerspectiveError::Config(e.to_string()))
    }

    fn locate() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("perspective-sql").join("config.toml"))
            .filter(|path| path.exists())
    }
}

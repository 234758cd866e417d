//! Configuration service implementation.
//!
//! Loads [`AppConfig`] from `~/.config/keepsake/config.toml`, falling back to
//! defaults for a missing file or missing keys, then applies environment
//! overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use keepsake_core::error::{KeepsakeError, Result};
use serde::{Deserialize, Serialize};

use crate::paths::KeepsakePaths;

/// Environment variable overriding `api_base_url`.
pub const ENV_API_URL: &str = "KEEPSAKE_API_URL";
/// Environment variable overriding `data_dir`.
pub const ENV_DATA_DIR: &str = "KEEPSAKE_DATA_DIR";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TYPING_DELAY_MS: u64 = 800;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Typical per-origin local storage budget.
pub const DEFAULT_STORAGE_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend base URL, without a trailing slash.
    pub api_base_url: String,
    /// Data directory; the platform default when unset.
    pub data_dir: Option<PathBuf>,
    /// Delay before an assistant message appears.
    pub typing_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Size limit of the string store.
    pub storage_quota_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            data_dir: None,
            typing_delay_ms: DEFAULT_TYPING_DELAY_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            storage_quota_bytes: DEFAULT_STORAGE_QUOTA_BYTES,
        }
    }
}

impl AppConfig {
    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.typing_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The configured data directory, or the platform default.
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(KeepsakePaths::data_dir()?),
        }
    }

    /// Applies overrides from a variable lookup.
    ///
    /// Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_blank(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(dir) = non_blank(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        self.api_base_url = self.api_base_url.trim_end_matches('/').to_string();
    }
}

/// Loads the application configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigService {
    path: Option<PathBuf>,
}

impl ConfigService {
    /// Reads the platform config file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `path` instead of the platform config file.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Loads the file (if any) and applies process environment overrides.
    pub fn load(&self) -> Result<AppConfig> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => KeepsakePaths::config_file()?,
        };

        let mut config = Self::load_file(&path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        tracing::debug!("[ConfigService] Loaded config: {:?}", config);
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<AppConfig> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    "[ConfigService] {} not found, using defaults",
                    path.display()
                );
                return Ok(AppConfig::default());
            }
            Err(e) => return Err(e.into()),
        };

        toml::from_str(&content).map_err(|e| {
            KeepsakeError::config(format!("Invalid config {}: {}", path.display(), e))
        })
    }
}

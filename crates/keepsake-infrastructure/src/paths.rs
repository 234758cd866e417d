//! Unified path management for keepsake files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/keepsake/          # Config directory
//! └── config.toml              # Application configuration
//!
//! ~/.local/share/keepsake/     # Data directory
//! ├── local_storage/           # String store (chatProgressV2.kv)
//! ├── chatProfileFileDB/       # Blob store
//! │   └── files/
//! └── logs/                    # Application logs
//!     └── keepsake.log.YYYY-MM-DD
//! ```

use std::path::{Path, PathBuf};

const APP_DIR: &str = "keepsake";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for keepsake_core::KeepsakeError {
    fn from(e: PathError) -> Self {
        keepsake_core::KeepsakeError::config(e.to_string())
    }
}

/// Platform directories used by keepsake.
pub struct KeepsakePaths;

impl KeepsakePaths {
    /// Returns the configuration directory (e.g., `~/.config/keepsake/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the data directory (e.g., `~/.local/share/keepsake/`).
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Directory of the string key/value store under `data_dir`.
    pub fn local_storage_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("local_storage")
    }

    /// Directory for rolling log files under `data_dir`.
    pub fn logs_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("logs")
    }
}

//! Unified path management for talktab configuration and data files.
//!
//! ```text
//! ~/.config/talktab/           # Config directory
//! └── config.toml              # Application configuration
//!
//! ~/.local/share/talktab/      # Data directory
//! └── conversations/           # One JSON file per session
//! ```

use std::path::PathBuf;

const APP_NAME: &str = "talktab";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors that can occur during path resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
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

/// Platform-specific locations for talktab files (XDG on Linux).
pub struct TalktabPaths;

impl TalktabPaths {
    /// Returns the configuration directory (e.g. `~/.config/talktab/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the data directory (e.g. `~/.local/share/talktab/`).
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to the user-level configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Returns the directory holding persisted conversations.
    pub fn conversations_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("conversations"))
    }
}

//! TOML settings persisted in the app directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;
use crate::atomic_file::atomic_write;
use crate::vocabulary::store::VOCABULARY_EXTENSION;

/// Default filename used to store the settings.
pub const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_MERGED_NAME: &str = "merged";

/// Errors that may occur while loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to create the config directory.
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to read the config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write the config file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config file is not valid TOML for [`Settings`].
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to serialize settings.
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    /// No usable config directory found.
    #[error("No suitable config directory found")]
    NoConfigDir,
}

/// User preferences for the merge workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Folder merged vocabularies are written to when no output is given.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// File stem used for merged vocabularies when no output is given.
    #[serde(default = "default_merged_name")]
    pub default_name: String,
    /// Folder of the most recently merged source files.
    #[serde(default)]
    pub last_source_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: None,
            default_name: default_merged_name(),
            last_source_dir: None,
        }
    }
}

impl Settings {
    /// Output path used when the caller did not pick one.
    pub fn default_output(&self, cwd: &Path) -> PathBuf {
        let dir = self.output_dir.as_deref().unwrap_or(cwd);
        dir.join(format!("{}.{VOCABULARY_EXTENSION}", self.default_name))
    }

    /// Resolve a source path given on the command line.
    ///
    /// Relative paths are tried against `cwd` first, then against the folder
    /// of the previous merge. When neither exists the `cwd` form is returned
    /// so the load error names the path the user typed.
    pub fn resolve_source(&self, cwd: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        let local = cwd.join(path);
        if local.exists() {
            return local;
        }
        match &self.last_source_dir {
            Some(dir) if dir.join(path).exists() => dir.join(path),
            _ => local,
        }
    }

    /// Remember the folder of the first source file.
    pub fn remember_sources(&mut self, sources: &[PathBuf]) {
        if let Some(parent) = sources.first().and_then(|path| path.parent()) {
            self.last_source_dir = Some(parent.to_path_buf());
        }
    }

    fn normalized(mut self) -> Self {
        if self.default_name.trim().is_empty() {
            self.default_name = default_merged_name();
        }
        self
    }
}

fn default_merged_name() -> String {
    DEFAULT_MERGED_NAME.to_string()
}

/// Resolve the default settings file path inside the app directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load settings from the app directory, returning defaults if missing.
pub fn load_or_default() -> Result<Settings, ConfigError> {
    load_from(&config_path()?)
}

/// Load settings from `path`, returning defaults if the file does not exist.
pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<Settings>(&text)
        .map(Settings::normalized)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
}

/// Persist settings to the app directory.
pub fn save(settings: &Settings) -> Result<(), ConfigError> {
    save_to_path(settings, &config_path()?)
}

/// Save settings to a specific path, creating parent directories as needed.
pub fn save_to_path(settings: &Settings, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(settings).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    atomic_write(path, data.as_bytes()).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => ConfigError::CreateDir { path, source },
    }
}

//! Configuration file structures for jsmod.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`SettingsFile`]: Script settings as written in the file
//! - [`ScriptEntry`]: A script given inline or by path

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RuntimeConfig, Script, Settings};

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// [runtime.evaluation]
/// deadline_ms = 15000
/// loop_iteration_limit = 100000000
///
/// [runtime.fetch]
/// timeout_secs = 60
///
/// [settings]
/// enable_error_port = true
///
/// [settings.script]
/// path = "./main.js"
///
/// [[settings.modules]]
/// name = "utils.js"
/// content = "export function typeOf(input) { return typeof input }"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Runtime configuration (evaluation + fetch settings).
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Script settings applied at startup.
    #[serde(default)]
    pub settings: SettingsFile,
}

/// Script settings as written in the configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SettingsFile {
    /// Route invocation errors to the error channel.
    #[serde(default)]
    pub enable_error_port: bool,

    /// The main script.
    #[serde(default)]
    pub script: ScriptEntry,

    /// Auxiliary modules.
    #[serde(default)]
    pub modules: Vec<ScriptEntry>,
}

/// A script given either inline (`content`) or by file (`path`).
///
/// Relative paths are resolved against the directory of the configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScriptEntry {
    /// Module name. Defaults to the file name of `path`.
    #[serde(default)]
    pub name: Option<String>,

    /// Inline source text.
    #[serde(default)]
    pub content: Option<String>,

    /// Path to the source file.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        debug!(path = %path.display(), "Config file read");

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed as TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }

    /// Build [`Settings`], reading any script files relative to `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if a script file cannot be read or a script sets both
    /// `content` and `path`.
    pub fn load_settings(&self, base_dir: impl AsRef<Path>) -> Result<Settings, ConfigFileError> {
        let base_dir = base_dir.as_ref();
        let script = self
            .settings
            .script
            .load(base_dir, &self.runtime.evaluation.main_module)?;
        let modules = self
            .settings
            .modules
            .iter()
            .map(|entry| entry.load(base_dir, ""))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Settings {
            enable_error_port: self.settings.enable_error_port,
            script,
            modules,
        })
    }
}

impl ScriptEntry {
    fn load(&self, base_dir: &Path, default_name: &str) -> Result<Script, ConfigFileError> {
        let name = self
            .name
            .clone()
            .or_else(|| {
                self.path
                    .as_ref()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| default_name.to_string());

        let content = match (&self.content, &self.path) {
            (Some(content), None) => content.clone(),
            (None, Some(path)) => {
                let full = base_dir.join(path);
                std::fs::read_to_string(&full).map_err(|e| ConfigFileError::Io {
                    path: full.display().to_string(),
                    source: e,
                })?
            }
            (None, None) => String::new(),
            (Some(_), Some(_)) => {
                return Err(ConfigFileError::Parse {
                    message: format!("script '{name}' sets both content and path"),
                });
            }
        };

        Ok(Script { name, content })
    }
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration or script file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}

//! Host-side settings file.
//!
//! Only the `script-debug` binary reads this; the core takes plain values.
//!
//! ```toml
//! [runtime]
//! search_paths = ["./lua"]
//! chunk_name = "script"
//!
//! [execution]
//! delay_ms = 0
//!
//! [logging]
//! level = "warn"
//! ```

use crate::runtime::RuntimeConfig;
use crate::{DebuggerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_DIR: &str = "script-debugger";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub runtime: RuntimeConfig,
    pub execution: ExecutionSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Pause after every line, in milliseconds.
    pub delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Settings {
    /// `<config dir>/script-debugger/config.toml`, when the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No settings file; using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(DebuggerError::Io)?;
        Self::parse(&text).map_err(|e| {
            DebuggerError::Config(format!("{}: {}", path.display(), e)).into()
        })
    }

    /// Parse TOML text, naming the offending key on failure.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let deserializer = toml::Deserializer::new(text);
        serde_path_to_error::deserialize(deserializer).map_err(|err| {
            let path = err.path().to_string();
            format!("invalid value at '{}': {}", path, err.into_inner())
        })
    }

    /// Write settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(DebuggerError::Io)?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| DebuggerError::Config(format!("Failed to serialize settings: {}", e)))?;
        fs::write(path, text).map_err(DebuggerError::Io)?;
        debug!(path = %path.display(), "Settings saved");
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) {
        *self = Self::default();
    }
}

//! Persisted command-line settings

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Context;
use la_client::AnalyzerConfig;
use la_sim::VirtualAnalyzerConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Settings stored between runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Serial connection settings
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// Device used by `--simulate`
    #[serde(default)]
    pub simulator: VirtualAnalyzerConfig,
}

/// Directory name under the user config base
const APP_DIR: &str = "la4800";

/// Settings file name within [`APP_DIR`]
const SETTINGS_FILE: &str = "settings.json";

/// Resolve the settings directory from an `XDG_CONFIG_HOME` value and the home directory
///
/// A relative `XDG_CONFIG_HOME` is ignored.
fn settings_dir(xdg_config_home: Option<OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
    xdg_config_home
        .map(PathBuf::from)
        .filter(|base| base.is_absolute())
        .or_else(|| home.map(|home| home.join(".config")))
        .map(|base| base.join(APP_DIR))
}

impl Settings {
    /// Default settings file, `$XDG_CONFIG_HOME/la4800/settings.json` or `~/.config/la4800/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        settings_dir(std::env::var_os("XDG_CONFIG_HOME"), dirs::home_dir())
            .map(|dir| dir.join(SETTINGS_FILE))
    }

    /// Load settings, using defaults when the file is missing or unreadable
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Ignoring invalid settings in {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Write settings as pretty JSON, creating the parent directory
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
    }
}

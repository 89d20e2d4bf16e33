//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// State file used by `report` when none is given.
    pub state_path: PathBuf,

    /// Participants not seen for this many days are left out of reports.
    pub retention_days: i64,

    /// Terminal width the report lays its columns out for.
    pub report_width: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            state_path: data_dir.join("state.json"),
            retention_days: 999,
            report_width: 80,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // LURK_STATE_PATH, LURK_RETENTION_DAYS, ...
        figment = figment.merge(Env::prefixed("LURK_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for lurk.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("lurk"))
}

/// Returns the platform-specific data directory for lurk.
///
/// On Linux: `~/.local/share/lurk`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("lurk"))
}

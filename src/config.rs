//! Project configuration (`spec.md` SPEC_FULL.md §3): `config.toml` at the
//! project root, parsed the way `helm::config::Config` loads its TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ZeusError};

/// Filename of the project configuration file, sibling to `vision`.
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    Auto,
    Manual,
}

impl Default for ApprovalMode {
    fn default() -> Self {
        Self::Auto
    }
}

/// A project's configuration (`spec.md` §4.7 approval mode; §5 lock
/// timeout; codec forward-compatibility schema version).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub approval_mode: ApprovalMode,
    pub lock_timeout_secs: u64,
    pub schema_version: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            approval_mode: ApprovalMode::default(),
            lock_timeout_secs: 30,
            schema_version: crate::codec::CURRENT_SCHEMA_VERSION,
        }
    }
}

impl Config {
    /// Loads `config.toml` from `root`, or returns the default if absent —
    /// `init`-created projects always write one, so absence only happens
    /// for a store that predates configuration or was hand-assembled.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|e| ZeusError::io(&path, e))?;
        toml::from_str(&text).map_err(|e| ZeusError::Codec {
            path,
            message: format!("invalid config.toml: {e}"),
        })
    }

    /// Writes `config.toml` at `root`, overwriting any existing file.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(CONFIG_FILE);
        let text = toml::to_string_pretty(self).map_err(|e| ZeusError::Codec {
            path: path.clone(),
            message: format!("failed to serialize config.toml: {e}"),
        })?;
        std::fs::write(&path, text).map_err(|e| ZeusError::io(&path, e))
    }

    #[must_use]
    pub fn lock_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.lock_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.approval_mode, ApprovalMode::Auto);
        assert_eq!(config.lock_timeout_secs, 30);
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.approval_mode = ApprovalMode::Manual;
        config.lock_timeout_secs = 5;
        config.save(dir.path()).unwrap();
        let back = Config::load(dir.path()).unwrap();
        assert_eq!(back.approval_mode, ApprovalMode::Manual);
        assert_eq!(back.lock_timeout_secs, 5);
    }
}

//! Repository configuration (`.backport.toml`).
//!
//! Optional, read from the repository root. Missing file → all defaults
//! (no error). Unknown fields are rejected so typos surface instead of
//! silently doing nothing.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::BackportError;

/// Config file name, looked up at the repository root.
pub const CONFIG_FILE: &str = ".backport.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level backport configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackportConfig {
    /// Repository-level settings.
    #[serde(default)]
    pub repo: RepoConfig,

    /// External-call limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl BackportConfig {
    /// Load config from `<root>/.backport.toml`. Missing file → defaults.
    ///
    /// # Errors
    /// Returns [`BackportError::Config`] on unreadable or unparsable files.
    pub fn load(root: &Path) -> Result<Self, BackportError> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| BackportError::Config {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| BackportError::Config {
            path,
            detail: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// RepoConfig
// ---------------------------------------------------------------------------

/// Repository-level settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    /// Git remote to fetch from and push to. Unset → auto-detect
    /// (prefer `upstream`, then `origin`, then the sole remote).
    #[serde(default)]
    pub remote: Option<String>,

    /// `owner/repo` passed to gh with `-R`. Unset → gh uses the current
    /// repository.
    #[serde(default)]
    pub github: Option<String>,

    /// The mainline branch name (default: `"main"`).
    #[serde(default = "default_mainline")]
    pub mainline: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            remote: None,
            github: None,
            mainline: default_mainline(),
        }
    }
}

fn default_mainline() -> String {
    "main".to_owned()
}

// ---------------------------------------------------------------------------
// LimitsConfig
// ---------------------------------------------------------------------------

/// Deadlines for external calls.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Per-command deadline for git and gh calls, in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl LimitsConfig {
    /// The per-command deadline as a [`Duration`].
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

const fn default_command_timeout_secs() -> u64 {
    120
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BackportConfig::load(dir.path()).unwrap();
        assert_eq!(config, BackportConfig::default());
        assert_eq!(config.repo.mainline, "main");
        assert_eq!(config.limits.command_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[repo]\nremote = \"upstream\"\n",
        )
        .unwrap();
        let config = BackportConfig::load(dir.path()).unwrap();
        assert_eq!(config.repo.remote.as_deref(), Some("upstream"));
        assert_eq!(config.repo.mainline, "main");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[repo]\nremot = \"x\"\n").unwrap();
        assert!(BackportConfig::load(dir.path()).is_err());
    }
}

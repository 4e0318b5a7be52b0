//! Configuration loading and management
//!
//! Handles parsing of the `.worklog.toml` file at the tracker root.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;

/// Name of the configuration file at the tracker root
pub const CONFIG_FILE: &str = ".worklog.toml";

/// Hard ceiling for `tracker.max_depth`
const MAX_DEPTH_LIMIT: usize = 4096;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Actor configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// State file locking
    #[serde(default)]
    pub storage: StorageConfig,

    /// Hierarchy and aggregation limits
    #[serde(default)]
    pub tracker: TrackerConfig,
}

/// Actor-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Default actor when none is given on the command line or environment
    #[serde(default = "default_actor")]
    pub default: String,
}

fn default_actor() -> String {
    "unknown".to_string()
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            default: default_actor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// How long a command waits for the state lock before failing
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Longest ancestor chain walked during progress propagation
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Number of active tasks listed on the dashboard
    #[serde(default = "default_dashboard_limit")]
    pub dashboard_limit: usize,
}

fn default_max_depth() -> usize {
    256
}

fn default_dashboard_limit() -> usize {
    10
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            dashboard_limit: default_dashboard_limit(),
        }
    }
}

impl Config {
    /// Load configuration from a `.worklog.toml` file
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the tracker root, or return defaults
    pub fn load_from_root(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.actor.default.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "actor.default cannot be empty".to_string(),
            ));
        }
        if self.storage.lock_timeout_ms == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "storage.lock_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.tracker.max_depth == 0 || self.tracker.max_depth > MAX_DEPTH_LIMIT {
            return Err(crate::error::Error::InvalidConfig(format!(
                "tracker.max_depth must be between 1 and {MAX_DEPTH_LIMIT}"
            )));
        }
        if self.tracker.dashboard_limit == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "tracker.dashboard_limit must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parses_partial_config_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let content = r#"
[tracker]
max_depth = 8
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.tracker.max_depth, 8);
        assert_eq!(cfg.tracker.dashboard_limit, 10);
        assert_eq!(cfg.storage.lock_timeout_ms, DEFAULT_LOCK_TIMEOUT_MS);
        assert_eq!(cfg.actor.default, "unknown");
    }

    #[test]
    fn zero_depth_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[tracker]\nmax_depth = 0").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            crate::error::Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_from_root_defaults_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_root(dir.path());
        assert_eq!(cfg.tracker.max_depth, 256);
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        Config::default().save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("max_depth = 256"));
        assert!(written.contains("lock_timeout_ms = 5000"));
    }
}

//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tally_merge::MergeOptions;
use tally_store::DEFAULT_MAX_COPIES;

use crate::NodeError;

/// Configuration for a Tally node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Home directory holding wallets, copies and lock tokens.
    #[serde(default = "default_home")]
    pub home: PathBuf,

    /// Seconds a push or merge waits for a busy wallet.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Copies retained per wallet.
    #[serde(default = "default_max_copies")]
    pub max_copies: usize,

    /// Merge against the trust-weighted baseline; `false` is strict mode.
    #[serde(default = "default_true")]
    pub baseline: bool,

    /// Drop a wallet's stored copies once a merge has consumed them.
    #[serde(default = "default_true")]
    pub clean_copies: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_home() -> PathBuf {
    PathBuf::from("./tally_home")
}

fn default_lock_timeout_secs() -> u64 {
    30
}

fn default_max_copies() -> usize {
    DEFAULT_MAX_COPIES
}

fn default_true() -> bool {
    true
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// A default configuration rooted at `home`.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn wallets_dir(&self) -> PathBuf {
        self.home.join("wallets")
    }

    pub fn copies_dir(&self) -> PathBuf {
        self.home.join("copies")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.home.join("locks")
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            baseline: self.baseline,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            home: default_home(),
            lock_timeout_secs: default_lock_timeout_secs(),
            max_copies: default_max_copies(),
            baseline: default_true(),
            clean_copies: default_true(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.home, PathBuf::from("./tally_home"));
        assert_eq!(config.lock_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_copies, 16);
        assert!(config.baseline);
        assert!(config.clean_copies);
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            home = "/var/lib/tally"
            lock_timeout_secs = 5
            baseline = false
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.copies_dir(), PathBuf::from("/var/lib/tally/copies"));
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.merge_options(), MergeOptions::strict());
        assert_eq!(config.log_level, "info"); // default
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/tally.toml");
        assert!(matches!(result.unwrap_err(), NodeError::Config(_)));
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(NodeConfig::from_toml_str("lock_timeout_secs = \"soon\"").is_err());
    }
}

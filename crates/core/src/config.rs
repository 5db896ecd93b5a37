//! Configuration management for BanMesh.
//!
//! The node table and sync tuning are read once at startup from a TOML file
//! and never reloaded.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::types::NodeId;

/// Default sentinel prefix marking sync-originated ban reasons.
pub const DEFAULT_SYNC_TAG: &str = "[BanSync]";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// Path that was attempted
        path: String,
        /// Underlying IO failure
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config parsed but violates a constraint
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
    /// Replication tuning
    #[serde(default)]
    pub sync: SyncSettings,
    /// Ordered node table
    pub nodes: Vec<NodeConfig>,
}

/// One node entry, in registry order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node identity
    pub id: NodeId,
    /// Human readable name used in reports
    pub display_name: String,
    /// Channel that receives reports for this node
    #[serde(default)]
    pub log_sink: Option<String>,
}

/// Replication tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Minimum spacing between writes for the same subject
    pub inter_write_delay_ms: u64,
    /// Lifetime of an unreleased processing token
    pub lock_ttl_secs: u64,
    /// Interval of the background token sweep
    pub sweep_interval_secs: u64,
    /// Timeout applied to every remote call
    pub gateway_timeout_ms: u64,
    /// Subjects reconciled concurrently (1 = sequential)
    pub reconcile_workers: usize,
    /// Report `NotAMember` instead of banning non-members
    pub require_membership: bool,
    /// Sentinel prefix for sync-originated reasons
    pub sync_tag: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            inter_write_delay_ms: 1000,
            lock_ttl_secs: 30,
            sweep_interval_secs: 60,
            gateway_timeout_ms: 5000,
            reconcile_workers: 1,
            require_membership: false,
            sync_tag: DEFAULT_SYNC_TAG.to_string(),
        }
    }
}

impl SyncSettings {
    /// Inter-write delay as a duration
    pub fn inter_write_delay(&self) -> Duration {
        Duration::from_millis(self.inter_write_delay_ms)
    }

    /// Token TTL as a duration
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    /// Sweep interval as a duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Remote call timeout as a duration
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }
}

impl Config {
    /// Load and validate a config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::Invalid("at least one node is required".into()));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.id.as_str().trim().is_empty() {
                return Err(ConfigError::Invalid("node id must not be empty".into()));
            }
            if !seen.insert(node.id.clone()) {
                return Err(ConfigError::Invalid(format!("duplicate node id {}", node.id)));
            }
        }

        if self.sync.sync_tag.trim().is_empty() {
            return Err(ConfigError::Invalid("sync_tag must not be empty".into()));
        }
        if self.sync.reconcile_workers == 0 {
            return Err(ConfigError::Invalid("reconcile_workers must be at least 1".into()));
        }
        if self.sync.lock_ttl_secs == 0 {
            return Err(ConfigError::Invalid("lock_ttl_secs must be positive".into()));
        }
        if self.sync.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid("sweep_interval_secs must be positive".into()));
        }

        Ok(())
    }
}

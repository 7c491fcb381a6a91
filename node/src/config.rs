//! Node configuration with TOML file support.

use lumina_anchor::AnchorConfig;
use lumina_governance::{CoherenceConfig, GovernanceParams};
use lumina_utils::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::NodeError;

/// Configuration for a Lumina gate node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter, e.g. "info" or "debug,lumina_governance=trace".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// File the journal ledger appends anchor records to.
    #[serde(default = "default_journal_path")]
    pub journal_path: PathBuf,

    /// How long `stop` waits for background tasks.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// How often execution outcomes that storage refused are retried.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    #[serde(default)]
    pub governance: GovernanceParams,

    #[serde(default)]
    pub coherence: CoherenceConfig,

    #[serde(default)]
    pub anchor: AnchorConfig,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("./lumina_data/anchors.jsonl")
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

fn default_reconcile_interval_secs() -> u64 {
    30
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
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

    /// Reject configurations the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        self.governance.validate()?;
        let coherence = &self.coherence;
        if !coherence.minimum.is_finite() || !(0.0..=1.0).contains(&coherence.minimum) {
            return Err(NodeError::Config(format!(
                "coherence.minimum must be within [0, 1], got {}",
                coherence.minimum
            )));
        }
        if coherence.window_secs == 0 || coherence.interval_secs == 0 {
            return Err(NodeError::Config(
                "coherence.window_secs and coherence.interval_secs must be positive".into(),
            ));
        }
        if coherence.max_age_secs < coherence.interval_secs {
            return Err(NodeError::Config(format!(
                "coherence.max_age_secs ({}) must be at least coherence.interval_secs ({})",
                coherence.max_age_secs, coherence.interval_secs
            )));
        }
        if self.reconcile_interval_secs == 0 {
            return Err(NodeError::Config("reconcile_interval_secs must be positive".into()));
        }
        if self.anchor.enabled && self.anchor.chain.trim().is_empty() {
            return Err(NodeError::Config("anchor.chain must not be blank".into()));
        }
        Ok(())
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            journal_path: default_journal_path(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            governance: GovernanceParams::default(),
            coherence: CoherenceConfig::default(),
            anchor: AnchorConfig::default(),
        }
    }
}

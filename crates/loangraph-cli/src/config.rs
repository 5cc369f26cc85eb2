//! Runner configuration

use std::path::Path;

use loangraph_core::Error;
use loangraph_policy::DecisionMode;
use serde::{Deserialize, Serialize};

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Policy file path (JSON or YAML)
    #[serde(default = "default_policy_path")]
    pub policy_path: String,

    /// How the decision of a fully passing evaluation is chosen
    #[serde(default)]
    pub decision_mode: DecisionMode,

    /// Treat policy lint warnings as fatal
    #[serde(default)]
    pub strict: bool,

    /// Batch evaluation configuration
    #[serde(default)]
    pub batch: BatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Audit trail configuration
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Values given on the command line, applied over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub policy: Option<String>,
    pub decision_mode: Option<DecisionMode>,
    pub strict: bool,
    pub concurrency: Option<usize>,
    pub audit_path: Option<String>,
}

impl CliConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, overrides: &ConfigOverrides) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        // Apply CLI overrides
        if let Some(policy) = &overrides.policy {
            config.policy_path = policy.clone();
        }

        if let Some(mode) = overrides.decision_mode {
            config.decision_mode = mode;
        }

        if overrides.strict {
            config.strict = true;
        }

        if let Some(concurrency) = overrides.concurrency {
            config.batch.concurrency = concurrency;
        }

        if let Some(path) = &overrides.audit_path {
            config.audit.enabled = true;
            config.audit.path = path.clone();
        }

        if config.batch.concurrency == 0 {
            return Err(Error::config("batch.concurrency must be at least 1").into());
        }

        Ok(config)
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            policy_path: default_policy_path(),
            decision_mode: DecisionMode::default(),
            strict: false,
            batch: BatchConfig::default(),
            logging: LoggingConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

/// Batch evaluation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum evaluations in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Audit trail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub enabled: bool,

    /// JSON-lines file the trail is appended to
    #[serde(default = "default_audit_path")]
    pub path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_audit_path(),
        }
    }
}

fn default_policy_path() -> String {
    "./policies/policy.json".to_string()
}

fn default_concurrency() -> usize {
    num_cpus::get()
}

fn default_audit_path() -> String {
    "./audit.jsonl".to_string()
}

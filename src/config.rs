//! CLI configuration
//!
//! One YAML document covering the engine knobs, the automation agent, locator
//! tables and the optional recovery endpoint.

use action_flow::{OrchestratorConfig, RemoteRecoveryConfig};
use action_primitives::UiAgentConfig;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: OrchestratorConfig,
    pub agent: UiAgentConfig,
    pub locators: LocatorSettings,
    pub recovery: RecoverySettings,
    /// Prometheus endpoint port; 0 disables it
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorSettings {
    /// Extra platform tables merged over the built-in ones
    pub tables_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoverySettings {
    pub enabled: bool,
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        let remote = RemoteRecoveryConfig::default();
        Self {
            enabled: false,
            url: remote.url,
            timeout_ms: remote.timeout_ms,
        }
    }
}

impl RecoverySettings {
    pub fn remote(&self) -> RemoteRecoveryConfig {
        RemoteRecoveryConfig {
            url: self.url.clone(),
            timeout_ms: self.timeout_ms,
        }
    }
}

impl Config {
    /// Engine settings with the recovery switch applied
    pub fn engine(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            enable_recovery_strategy: self.engine.enable_recovery_strategy || self.recovery.enabled,
            ..self.engine.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        if self.agent.url.trim().is_empty() {
            bail!("agent.url must not be empty");
        }
        if self.agent.request_timeout_ms == 0 {
            bail!("agent.request_timeout_ms must be positive");
        }
        if self.recovery.enabled && self.recovery.url.trim().is_empty() {
            bail!("recovery.url is required when recovery is enabled");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = r#"
engine:
  max_attempts_per_item: 5
  backoff_mode: exponential
recovery:
  enabled: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.engine.max_attempts_per_item, 5);
        assert_eq!(config.engine.attempt_backoff_ms, 2000);
        assert_eq!(config.agent.url, "http://localhost:8000");
        assert!(config.engine().enable_recovery_strategy);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_engine_knobs_are_rejected() {
        let mut config = Config::default();
        config.engine.max_attempts_per_item = 0;
        assert!(config.validate().is_err());
    }
}

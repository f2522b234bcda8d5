use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::coordinator::CoordinatorConfig;
use crate::domain::{AgentId, PoolKey};
use crate::execution::ExecutionConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub coordinator: CoordinatorConfig,
    pub reveals: RevealConfig,
    pub execution: ExecutionConfig,
    pub settlement: SettlementConfig,
    /// Pools monitored from start-up
    pub pools: Vec<PoolConfig>,
    /// Agents registered with the coordinator at start-up
    pub agents: Vec<AgentId>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Gap between consecutive reveal transactions (ms)
    pub submission_spacing_ms: u64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            submission_spacing_ms: 2_000,
        }
    }
}

impl RevealConfig {
    pub fn submission_spacing(&self) -> Duration {
        Duration::from_millis(self.submission_spacing_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Settlement gateway base URL; unset means the simulated backend
    pub endpoint: Option<String>,
    /// Per-request timeout for the HTTP backend (ms)
    pub request_timeout_ms: u64,
    /// Force the simulated backend even when an endpoint is configured
    pub dry_run: bool,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_ms: 15_000,
            dry_run: false,
        }
    }
}

impl SettlementConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub pool_key: PoolKey,
}

impl PoolConfig {
    pub fn pool_id(&self) -> String {
        self.pool_key.pool_id()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Write a daily-rotated log file next to console output
    #[serde(default = "default_true")]
    pub file: bool,
    /// Log directory; `SEALBATCH_LOG_DIR` takes precedence
    #[serde(default)]
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: true,
            dir: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SEALBATCH_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (SEALBATCH_COORDINATOR__QUORUM_AGENTS, etc.)
            .add_source(
                Environment::with_prefix("SEALBATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // Coordinator
        if self.coordinator.quorum_agents == 0 {
            errors.push("coordinator.quorum_agents must be at least 1".to_string());
        }
        if self.coordinator.countdown_window_ms == 0 {
            errors.push("coordinator.countdown_window_ms must be positive".to_string());
        }
        if self.coordinator.staleness_threshold_ms < self.coordinator.countdown_window_ms {
            errors.push(
                "coordinator.staleness_threshold_ms should not be shorter than countdown_window_ms"
                    .to_string(),
            );
        }

        // Reveals and execution
        if self.reveals.submission_spacing_ms == 0 {
            errors.push("reveals.submission_spacing_ms must be positive".to_string());
        }
        if self.execution.poll_interval_ms == 0 {
            errors.push("execution.poll_interval_ms must be positive".to_string());
        }
        if self.execution.default_min_commitments == 0 {
            errors.push("execution.default_min_commitments must be at least 1".to_string());
        }

        // Settlement
        if let Some(endpoint) = &self.settlement.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                errors.push(format!(
                    "settlement.endpoint must be an http(s) URL, got {endpoint}"
                ));
            }
        }
        if self.settlement.request_timeout_ms == 0 {
            errors.push("settlement.request_timeout_ms must be positive".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for agent in &self.agents {
            if agent.trim().is_empty() {
                errors.push("agents must not contain empty ids".to_string());
            } else if !seen.insert(agent) {
                errors.push(format!("agent {agent} is listed twice"));
            }
        }

        if !["trace", "debug", "info", "warn", "error"]
            .contains(&self.logging.level.to_ascii_lowercase().as_str())
        {
            errors.push(format!("logging.level {} is not a log level", self.logging.level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::ConflictStrategy;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.coordinator.quorum_agents, 2);
        assert_eq!(config.coordinator.conflict_strategy, ConflictStrategy::Median);
        assert_eq!(config.reveals.submission_spacing(), Duration::from_secs(2));
        assert_eq!(config.execution.settle_delay_ms, 10_000);
        assert_eq!(config.execution.max_retries, 3);
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let mut config = AppConfig::default();
        config.coordinator.quorum_agents = 0;
        config.coordinator.staleness_threshold_ms = 1_000;
        config.settlement.endpoint = Some("localhost:8545".into());
        config.agents = vec!["a".into(), "a".into()];

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("quorum_agents")));
        assert!(errors.iter().any(|e| e.contains("listed twice")));
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".into();
        let errors = config.validate().unwrap_err();
        assert_eq!(errors, vec!["logging.level loud is not a log level".to_string()]);

        config.logging.level = "WARN".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml() {
        let dir = std::env::temp_dir().join(format!("sealbatch-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("default.toml"),
            r#"
agents = ["alpha", "beta"]

[coordinator]
quorum_agents = 3
conflict_strategy = "max"

[execution]
with_proofs = true

[[pools]]
pool_key = { currency0 = "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a", currency1 = "0x0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b", fee = 3000, tick_spacing = 60, hooks = "0x0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c" }
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&dir).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(config.agents, vec!["alpha".to_string(), "beta".to_string()]);
        assert_eq!(config.coordinator.quorum_agents, 3);
        assert_eq!(config.coordinator.conflict_strategy, ConflictStrategy::Max);
        // Untouched fields keep their defaults
        assert_eq!(config.coordinator.countdown_window_ms, 30_000);
        assert!(config.execution.with_proofs);
        assert_eq!(config.pools.len(), 1);
        assert_eq!(config.pools[0].pool_key.fee, 3000);
    }

    #[test]
    fn test_env_overrides_use_single_underscore_after_prefix() {
        let dir = std::env::temp_dir().join(format!("sealbatch-env-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("default.toml"), "[execution]\npoll_interval_ms = 1000\n").unwrap();

        std::env::set_var("SEALBATCH_EXECUTION__POLL_INTERVAL_MS", "4500");
        let loaded = AppConfig::load_from(&dir);
        std::env::remove_var("SEALBATCH_EXECUTION__POLL_INTERVAL_MS");
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(loaded.unwrap().execution.poll_interval_ms, 4_500);
    }
}

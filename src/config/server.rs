//! Server and group configuration structures.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::{HandleConfig, HandleMode};

/// Environment variable naming the JSON configuration file.
pub const CONFIG_PATH_ENV: &str = "PIPELINE_CONFIG";

const fn default_batch_size() -> usize {
    1
}

/// Group configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Worker slots.
    pub concurrency: usize,
    /// Input queue capacity; defaults to `concurrency`.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    /// Tasks per handler invocation.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Handler invocation mode.
    #[serde(default)]
    pub mode: HandleMode,
}

impl GroupConfig {
    /// Validate group configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be greater than 0".into());
        }
        if self.queue_capacity == Some(0) {
            return Err("queue_capacity must be greater than 0".into());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".into());
        }
        Ok(())
    }

    /// Handler configuration matching this group's batch size and mode.
    #[must_use]
    pub fn handle_config(&self) -> HandleConfig {
        HandleConfig::new()
            .with_batch_size(self.batch_size)
            .with_mode(self.mode)
    }
}

/// Root server configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Map of group name to configuration.
    pub groups: HashMap<String, GroupConfig>,
}

impl ServerConfig {
    /// Validate all groups and ensure at least one group exists.
    pub fn validate(&self) -> Result<(), String> {
        if self.groups.is_empty() {
            return Err("at least one group must be defined".into());
        }
        for (name, group) in &self.groups {
            group
                .validate()
                .map_err(|e| format!("group `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse server configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load `.env` if present, then read the file named by `PIPELINE_CONFIG`.
    pub fn from_env() -> Result<Self, String> {
        // A missing .env file is fine; the variable may come from the environment.
        let _ = dotenvy::dotenv();
        let path = std::env::var(CONFIG_PATH_ENV)
            .map_err(|_| format!("{CONFIG_PATH_ENV} is not set"))?;
        let input = std::fs::read_to_string(&path).map_err(|e| format!("read {path}: {e}"))?;
        Self::from_json_str(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let cfg = ServerConfig::from_json_str(r#"{"groups": {"parse": {"concurrency": 4}}}"#).unwrap();
        let parse = &cfg.groups["parse"];
        assert_eq!(parse.queue_capacity, None);
        assert_eq!(parse.batch_size, 1);
        assert_eq!(parse.mode, HandleMode::Cooperative);
    }

    #[test]
    fn test_handle_config_follows_group() {
        let group = GroupConfig {
            concurrency: 2,
            queue_capacity: Some(8),
            batch_size: 5,
            mode: HandleMode::Thread,
        };
        let handle = group.handle_config();
        assert_eq!(handle.batch_size, 5);
        assert_eq!(handle.mode, HandleMode::Thread);
    }

    #[test]
    fn test_empty_config_rejected() {
        let err = ServerConfig::from_json_str(r#"{"groups": {}}"#).unwrap_err();
        assert!(err.contains("at least one group"));
    }
}

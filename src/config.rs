//! Runtime configuration
//!
//! Loaded from YAML; every field has a default so a partial file, or no file
//! at all, is valid.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{
    error::ActorError,
    resizer::{PoolConfig, ResizerConfig},
    supervisor::{SupervisorConfig, SupervisorPolicy}
};

/// Configuration structure for the actor runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Prefix of every generated actor instance name
    pub system_name:           String,
    /// Pool size used by pooled registrations without an override
    pub pool_defaults:         PoolConfig,
    /// Default retry budget
    pub supervisor:            SupervisorConfig,
    /// Default pool elasticity
    pub resizer:               ResizerConfig,
    /// Default `ask` deadline
    pub ask_timeout_ms:        u64,
    /// Grace period for draining actors on shutdown
    pub shutdown_timeout_ms:   u64,
    /// Grace period when an actor escalates
    pub escalation_timeout_ms: u64,
    /// Per type-tag pool overrides
    pub actors:                BTreeMap<String, PoolConfig>
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            system_name:           "actor-host".to_string(),
            pool_defaults:         PoolConfig::default(),
            supervisor:            SupervisorConfig::default(),
            resizer:               ResizerConfig::default(),
            ask_timeout_ms:        5_000,
            shutdown_timeout_ms:   5_000,
            escalation_timeout_ms: 1_000,
            actors:                BTreeMap::new()
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self, ActorError> {
        let config: RuntimeConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn load(path: &Path) -> Result<Self, ActorError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ActorError::Configuration(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&content)
    }

    /// Load the file at the default location, or fall back to defaults when absent
    pub fn load_or_default() -> Result<Self, ActorError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default())
        }
    }

    /// Platform config location, e.g. `~/.config/actor-host/runtime.yaml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "actor-host").map(|dirs| dirs.config_dir().join("runtime.yaml"))
    }

    pub fn to_yaml(&self) -> Result<String, ActorError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ActorError> {
        if self.system_name.trim().is_empty() {
            return Err(ActorError::InvalidConfig("system_name must not be empty".to_string()));
        }
        if self.escalation_timeout_ms == 0 || self.shutdown_timeout_ms == 0 || self.ask_timeout_ms == 0 {
            return Err(ActorError::InvalidConfig("timeouts must be non-zero".to_string()));
        }

        self.pool_defaults.validate()?;
        self.resizer.validate()?;
        SupervisorPolicy::from_config(&self.supervisor)?;

        for (type_tag, pool) in &self.actors {
            pool.validate().map_err(|e| ActorError::InvalidConfig(format!("actors.{}: {}", type_tag, e)))?;
        }

        Ok(())
    }

    /// Pool size for a type tag, falling back to `pool_defaults`
    pub fn pool_for(&self, type_tag: &str) -> PoolConfig {
        let wanted = type_tag.trim().to_lowercase();
        self.actors
            .iter()
            .find(|(tag, _)| tag.trim().to_lowercase() == wanted)
            .map(|(_, pool)| *pool)
            .unwrap_or(self.pool_defaults)
    }

    pub fn default_policy(&self) -> Result<SupervisorPolicy, ActorError> {
        SupervisorPolicy::from_config(&self.supervisor)
    }

    pub fn ask_timeout(&self) -> Duration {
        Duration::from_millis(self.ask_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn escalation_timeout(&self) -> Duration {
        Duration::from_millis(self.escalation_timeout_ms)
    }
}

//! Configuration loading and management.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Endpoint of the shakesapp demo service.
pub const DEFAULT_ENDPOINT: &str = "https://shakesapp-loiwv2t7ea-de.a.run.app";

/// Query terms used when a scenario does not provide its own.
pub const DEFAULT_VOCABULARY: &[&str] = &[
    "hello", "love", "life", "people", "cloud", "sun", "rainbow", "beauty",
];

/// Main test configuration, loaded from YAML or built from defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_endpoint")]
    pub target_endpoint: String,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    /// Pause after every iteration of a virtual user.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_true")]
    pub reuse_connections: bool,
    #[serde(default = "default_vocabulary")]
    pub vocabulary: Vec<String>,
    #[serde(default)]
    pub seed: Option<u64>, // Optional RNG seed for reproducible tests
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How long stopped users may take to wind down after the deadline.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_name() -> String {
    "shakesapp".to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_duration_secs() -> u64 {
    600
}

fn default_concurrency() -> u32 {
    10
}

fn default_delay_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_vocabulary() -> Vec<String> {
    DEFAULT_VOCABULARY.iter().map(|w| w.to_string()).collect()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_shutdown_grace_ms() -> u64 {
    1000
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: String::new(),
            target_endpoint: default_endpoint(),
            duration_secs: default_duration_secs(),
            concurrency: default_concurrency(),
            delay_ms: default_delay_ms(),
            reuse_connections: true,
            vocabulary: default_vocabulary(),
            seed: None,
            request_timeout_secs: default_request_timeout_secs(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl TestConfig {
    /// Load configuration from YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: TestConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration.
    ///
    /// Endpoint and vocabulary checks are shared with [`crate::RequestGenerator::new`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration_secs == 0 {
            return Err(ConfigError::ZeroDuration);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        crate::generator::RequestGenerator::new(&self.vocabulary, &self.target_endpoint)?;
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

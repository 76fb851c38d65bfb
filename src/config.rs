use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::resolve::ResolutionSettings;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub medkg: MedkgConfig,
    #[serde(default)]
    pub resolution: ResolutionSettings,
    #[serde(default)]
    pub disambiguation: DisambiguationConfig,
}

/// MedKG-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MedkgConfig {
    /// Path to the persisted knowledge graph JSON document.
    pub graph_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// External disambiguation service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DisambiguationConfig {
    /// When false, ambiguous mentions become new entities without a service
    /// call (offline mode).
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DisambiguationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_endpoint() -> String {
    "https://api.cerebras.ai/v1/disambiguate".to_string()
}

fn default_model() -> String {
    "llama3.3-70b".to_string()
}

fn default_api_key_env() -> String {
    "CEREBRAS_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in MEDKG_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("MEDKG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("resolution.accept_threshold", self.resolution.accept_threshold),
            ("resolution.ambiguity_margin", self.resolution.ambiguity_margin),
            ("resolution.candidate_floor", self.resolution.candidate_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be between 0.0 and 1.0, got {}", name, value);
            }
        }

        if self.resolution.candidate_floor > self.resolution.accept_threshold {
            anyhow::bail!(
                "resolution.candidate_floor ({}) must not exceed accept_threshold ({})",
                self.resolution.candidate_floor,
                self.resolution.accept_threshold
            );
        }

        if self.disambiguation.enabled {
            if self.disambiguation.timeout_secs == 0 {
                anyhow::bail!("disambiguation.timeout_secs must be greater than 0");
            }
            // Check both environment variable and .env file (dotenv already loaded in Config::load)
            std::env::var(&self.disambiguation.api_key_env).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or as an \
                     environment variable, or disable disambiguation.",
                    self.disambiguation.api_key_env
                )
            })?;
        }

        Ok(())
    }

    /// Get the persisted graph document path
    pub fn graph_path(&self) -> &Path {
        &self.medkg.graph_path
    }
}

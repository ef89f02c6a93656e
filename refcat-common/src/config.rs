//! Configuration loading and resolution
//!
//! Config file priority order:
//! 1. Explicit path (command-line argument)
//! 2. `REFCAT_CONFIG` environment variable
//! 3. `<config_dir>/refcat/config.toml`
//! 4. Compiled defaults
//!
//! A missing file is never fatal: the resolver logs a warning and uses defaults.
//! Credentials may additionally be overridden from the environment.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "REFCAT_CONFIG";
/// Environment override for the secondary index API key
pub const SECONDARY_API_KEY_ENV_VAR: &str = "REFCAT_SECONDARY_API_KEY";
/// Environment override for the primary index contact address
pub const MAILTO_ENV_VAR: &str = "REFCAT_MAILTO";

/// Complete refcat configuration
///
/// Every section falls back to its defaults when absent from the TOML document,
/// so a partial file (or an empty one) is always valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub primary_index: PrimaryIndexConfig,
    pub secondary_index: SecondaryIndexConfig,
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Primary bibliographic index (OpenAlex works API)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryIndexConfig {
    pub base_url: String,
    /// Contact identifier sent with every request (polite pool)
    pub mailto: String,
    pub per_page: u32,
    pub timeout_secs: u64,
    /// Half-width of the publication-year window used by the keyword stage
    pub year_window: i32,
}

impl Default for PrimaryIndexConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openalex.org".to_string(),
            mailto: String::new(),
            per_page: 10,
            timeout_secs: 30,
            year_window: 3,
        }
    }
}

/// Secondary bibliographic index (Semantic Scholar graph API)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryIndexConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub per_page: u32,
    pub timeout_secs: u64,
    /// Total attempts when the index answers with a rate-limit status
    pub max_attempts: u32,
    pub base_delay_ms_with_key: u64,
    pub base_delay_ms_without_key: u64,
    /// Global request budget, shared by every task using the client
    pub requests_per_second: u32,
}

impl Default for SecondaryIndexConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.semanticscholar.org/graph/v1".to_string(),
            api_key: None,
            per_page: 5,
            timeout_secs: 20,
            max_attempts: 2,
            base_delay_ms_with_key: 500,
            base_delay_ms_without_key: 2000,
            requests_per_second: 1,
        }
    }
}

impl SecondaryIndexConfig {
    /// API key if one is configured and non-blank
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| is_valid_key(k))
    }

    /// Base delay of the linear rate-limit backoff
    ///
    /// Keyed clients get a shorter delay because their quota is larger.
    pub fn base_delay_ms(&self) -> u64 {
        if self.usable_api_key().is_some() {
            self.base_delay_ms_with_key
        } else {
            self.base_delay_ms_without_key
        }
    }
}

/// Language model backing the parser, classifier and comparator capabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Ollama-compatible server
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "llama3.1".to_string(),
            temperature: 0.0,
            max_tokens: 512,
            timeout_secs: 120,
        }
    }
}

/// Per-reference pipeline behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Characters of raw text used when a title has to be synthesized
    pub title_prefix_chars: usize,
    pub truncation_marker: String,
    pub notes_delimiter: String,
    /// Delimiter for list-valued columns in the export
    pub list_delimiter: String,
    /// References resolved at once (1 = strictly sequential)
    pub concurrency: usize,
    pub max_refs: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title_prefix_chars: 120,
            truncation_marker: "...".to_string(),
            notes_delimiter: " | ".to_string(),
            list_delimiter: "; ".to_string(),
            concurrency: 1,
            max_refs: None,
        }
    }
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read config {} failed: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply environment overrides for credentials
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(SECONDARY_API_KEY_ENV_VAR) {
            if is_valid_key(&key) {
                info!("Secondary index API key loaded from environment variable");
                self.secondary_index.api_key = Some(key);
            }
        }
        if let Ok(mailto) = std::env::var(MAILTO_ENV_VAR) {
            if is_valid_key(&mailto) {
                self.primary_index.mailto = mailto;
            }
        }
    }

    /// Check values that would make the pipeline misbehave
    pub fn validate(&self) -> Result<()> {
        if self.primary_index.per_page == 0 {
            return Err(Error::Config("primary_index.per_page must be at least 1".to_string()));
        }
        if self.secondary_index.max_attempts == 0 {
            return Err(Error::Config(
                "secondary_index.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.secondary_index.requests_per_second == 0 {
            return Err(Error::Config(
                "secondary_index.requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.pipeline.concurrency == 0 {
            return Err(Error::Config("pipeline.concurrency must be at least 1".to_string()));
        }
        if self.pipeline.title_prefix_chars == 0 {
            return Err(Error::Config(
                "pipeline.title_prefix_chars must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolves which configuration file to load
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Locate the config file following the priority order
    ///
    /// Returns `None` when no candidate exists; callers then use defaults.
    pub fn locate(&self) -> Option<PathBuf> {
        // Priority 1: command-line argument
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        // Priority 2: environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: per-user config directory
        default_config_path().filter(|p| p.exists())
    }

    /// Load the resolved configuration
    ///
    /// An explicitly requested file (CLI or env) must exist and parse. The implicit
    /// per-user file is optional, and any problem with it degrades to defaults.
    pub fn load(&self) -> Result<TomlConfig> {
        let explicit = self.cli_path.is_some() || std::env::var(CONFIG_ENV_VAR).is_ok();

        let mut config = match self.locate() {
            Some(path) if explicit => {
                info!("Loading configuration from {}", path.display());
                TomlConfig::from_file(&path)?
            }
            Some(path) => match TomlConfig::from_file(&path) {
                Ok(config) => {
                    info!("Loading configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring unreadable config {}: {}. Using defaults.", path.display(), e);
                    TomlConfig::default()
                }
            },
            None => {
                warn!("No configuration file found, using compiled defaults");
                TomlConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

/// Default per-user configuration file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("refcat").join("config.toml"))
}

/// Validate a credential (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Standard User-Agent for outgoing HTTP requests
pub fn get_user_agent() -> String {
    format!("refcat/{}", env!("CARGO_PKG_VERSION"))
}

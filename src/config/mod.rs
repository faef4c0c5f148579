//! Service configuration.
//!
//! Resolution order, later wins: built-in defaults, an optional TOML file,
//! then environment variables. The model API key is mandatory; the service
//! refuses to start without it.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::providers::openai::{DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};

pub const DEFAULT_PERCEPTION_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_INTEGRATION_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_EXPANSION_MODEL: &str = "gpt-4.1";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Environment variables recognized by [`Config::apply_env_overrides`].
pub mod env {
    pub const API_KEY: &str = "OPENAI_API_KEY";
    pub const API_URL: &str = "OPENAI_BASE_URL";
    pub const MODEL_PERCEPTION: &str = "MODEL_PI";
    pub const MODEL_INTEGRATION: &str = "MODEL_PHI";
    pub const MODEL_EXPANSION: &str = "MODEL_E";
    pub const HOST: &str = "HOST";
    pub const PORT: &str = "PORT";
    pub const STORE: &str = "CONVERSATION_STORE";
}

/// Model name per pipeline phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub perception: String,
    pub integration: String,
    pub expansion: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            perception: DEFAULT_PERCEPTION_MODEL.into(),
            integration: DEFAULT_INTEGRATION_MODEL.into(),
            expansion: DEFAULT_EXPANSION_MODEL.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
        }
    }
}

/// Conversation store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Log each completed conversation, keep nothing.
    #[default]
    Log,
    /// Keep the latest history per user in process memory.
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "memory" => Ok(Self::Memory),
            other => {
                anyhow::bail!("Unknown conversation store '{other}' (expected log or memory)")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Session cap for the in-memory store.
    pub max_sessions: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Log,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model backend credential.
    pub api_key: Option<String>,
    /// OpenAI-compatible API root.
    pub api_url: String,
    /// Client-side timeout for a single model call.
    pub request_timeout_secs: u64,
    pub gateway: GatewayConfig,
    pub models: ModelConfig,
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.into(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            gateway: GatewayConfig::default(),
            models: ModelConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Load defaults, merge `path` if given, then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply overrides from `lookup`. Blank values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(key) = get(env::API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(url) = get(env::API_URL) {
            self.api_url = url;
        }
        if let Some(model) = get(env::MODEL_PERCEPTION) {
            self.models.perception = model;
        }
        if let Some(model) = get(env::MODEL_INTEGRATION) {
            self.models.integration = model;
        }
        if let Some(model) = get(env::MODEL_EXPANSION) {
            self.models.expansion = model;
        }
        if let Some(host) = get(env::HOST) {
            self.gateway.host = host;
        }
        if let Some(port) = get(env::PORT) {
            self.gateway.port = port
                .parse()
                .with_context(|| format!("{} must be a port number, got '{port}'", env::PORT))?;
        }
        if let Some(kind) = get(env::STORE) {
            self.store.kind = kind
                .parse()
                .with_context(|| format!("Invalid {}", env::STORE))?;
        }
        Ok(())
    }

    /// Check that the service can run with this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.as_deref().map_or(true, |key| key.trim().is_empty()) {
            anyhow::bail!(
                "No model API key configured. Set {} or api_key in the config file.",
                env::API_KEY
            );
        }
        for (phase, model) in [
            ("perception", &self.models.perception),
            ("integration", &self.models.integration),
            ("expansion", &self.models.expansion),
        ] {
            if model.trim().is_empty() {
                anyhow::bail!("models.{phase} cannot be empty");
            }
        }
        if self.store.kind == StoreKind::Memory && self.store.max_sessions == 0 {
            anyhow::bail!("store.max_sessions must be at least 1 for the memory store");
        }
        Ok(())
    }

    /// The configured API key, or an error if it is missing.
    pub fn require_api_key(&self) -> Result<&str> {
        self.validate()?;
        self.api_key
            .as_deref()
            .context("model API key is not configured")
    }

    /// TOML rendering with the API key masked.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.api_key.is_some() {
            shown.api_key = Some("***".into());
        }
        toml::to_string_pretty(&shown).context("Failed to serialize config")
    }
}

//! Configuration for the AgentBroker SDK and CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::session::EncryptionPreference;

/// AgentBroker configuration — typically stored at `~/.agentbroker/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Registry broker base URL used by the HTTP adapters.
    #[serde(default = "default_url")]
    pub url: String,

    /// API key (or read from AGENTBROKER_API_KEY).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub semantic: SemanticConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_key: None,
            search: SearchConfig::default(),
            session: SessionConfig::default(),
            retry: RetryConfig::default(),
            semantic: SemanticConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// `~/.agentbroker/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".agentbroker").join("config.toml"))
    }

    /// Parse a TOML config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Load the default config file if it exists, then apply environment
    /// overrides.
    pub fn load_default() -> anyhow::Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply `AGENTBROKER_URL`, `AGENTBROKER_API_KEY` and
    /// `AGENTBROKER_HOME_REGISTRY`. Blank values are ignored.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let value = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(url) = value("AGENTBROKER_URL") {
            self.url = url;
        }
        if let Some(key) = value("AGENTBROKER_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(home) = value("AGENTBROKER_HOME_REGISTRY") {
            self.search.home_registry = Some(home);
        }
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn default_url() -> String {
    "http://localhost:4000/api/v1".into()
}

/// Search aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// The canonical default registry.
    #[serde(default = "default_registry")]
    pub default_registry: String,

    /// The caller's home registry, searched alongside the default one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_registry: Option<String>,

    /// Adapter tried first for the default registry.
    #[serde(default = "default_adapter")]
    pub default_adapter: String,

    /// Adapter used for semantic search. Unset: the first registered
    /// adapter advertising vector search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_adapter: Option<String>,

    /// Page size requested from adapters.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Pages fetched per adapter call to fill a post-filtered limit.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Upper bound applied to caller limits.
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_registry: default_registry(),
            home_registry: None,
            default_adapter: default_adapter(),
            vector_adapter: None,
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_registry() -> String {
    "1".into()
}

fn default_adapter() -> String {
    "erc8004-adapter".into()
}

fn default_page_size() -> usize {
    50
}

fn default_max_pages() -> usize {
    3
}

fn default_max_limit() -> usize {
    100
}

/// Session broker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Chat adapter used when the caller does not name one.
    #[serde(default = "default_chat_adapter")]
    pub chat_adapter: String,

    #[serde(default)]
    pub encryption: EncryptionPreference,

    /// History retention requested from the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_ttl_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chat_adapter: default_chat_adapter(),
            encryption: EncryptionPreference::default(),
            history_ttl_secs: None,
        }
    }
}

fn default_chat_adapter() -> String {
    "registry-broker".into()
}

/// Retry settings shared by search and chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    5_000
}

/// Semantic index settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Matches scoring below this are dropped.
    #[serde(default)]
    pub min_score: f32,

    /// Dimension of the built-in hash embedder.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            dimension: default_dimension(),
        }
    }
}

fn default_dimension() -> usize {
    384
}

/// Telemetry/observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether to export spans over OTLP.
    #[serde(default)]
    pub enabled: bool,

    /// OTLP exporter endpoint.
    #[serde(default = "default_otlp_endpoint")]
    pub otlp_endpoint: String,

    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: default_otlp_endpoint(),
            json: false,
        }
    }
}

fn default_otlp_endpoint() -> String {
    "http://localhost:4317".into()
}

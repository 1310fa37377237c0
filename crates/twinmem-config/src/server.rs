//! Server configuration: defaults, `config.toml`, then environment overlay.
//!
//! ```toml
//! [server]
//! transport = "stdio"      # or "http" (JSON-RPC over POST /mcp)
//! port = 8050
//!
//! [shared]                 # used by any slot without its own settings
//! provider = "openai"
//! model = "gpt-4o-mini"
//! service_url = "http://localhost:8888"
//!
//! [secondary]
//! provider = "ollama"
//! model = "llama3.1"
//! service_url = "http://localhost:8889"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use twinmem_core::{ConfigError, MemorySource};

use crate::provider::{
    DEFAULT_COLLECTION_NAME, DEFAULT_REQUEST_TIMEOUT_SECS, LlmProvider, ProviderConfig,
    mask_api_key,
};

pub const APP_NAME: &str = "twinmem";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8050;
pub const DEFAULT_USER_ID: &str = "user";

pub(crate) const POSITIVE_SECONDS: &str = "a positive number of seconds";

/// Wire transport of the MCP server.
///
/// The legacy `sse` transport is not served; naming it is a configuration
/// error pointing at `http`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Transport {
    #[default]
    Stdio,
    Http,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        }
    }
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            "sse" => Err(ConfigError::InvalidValue {
                key: "transport".to_string(),
                value: s.to_string(),
                expected: "stdio or http (sse is not served; use http for JSON-RPC over POST /mcp)",
            }),
            _ => Err(ConfigError::InvalidValue {
                key: "transport".to_string(),
                value: s.to_string(),
                expected: "stdio or http",
            }),
        }
    }
}

impl TryFrom<String> for Transport {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub transport: Transport,
    /// User id every memory operation is scoped to.
    pub user_id: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            transport: Transport::default(),
            user_id: DEFAULT_USER_ID.to_string(),
        }
    }
}

/// Partially specified provider settings from one source.
///
/// Every field is optional so sources can be layered; [`ServerConfig::resolve`]
/// validates the final combination.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOverrides {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub embedding_model: Option<String>,
    pub service_url: Option<String>,
    pub service_api_key: Option<String>,
    pub collection_name: Option<String>,
    pub database_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl ProviderOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fields set here win; unset fields come from `base`.
    pub fn layered_over(&self, base: &Self) -> Self {
        fn pick<T: Clone>(top: &Option<T>, base: &Option<T>) -> Option<T> {
            top.clone().or_else(|| base.clone())
        }

        Self {
            provider: pick(&self.provider, &base.provider),
            api_key: pick(&self.api_key, &base.api_key),
            base_url: pick(&self.base_url, &base.base_url),
            model: pick(&self.model, &base.model),
            embedding_model: pick(&self.embedding_model, &base.embedding_model),
            service_url: pick(&self.service_url, &base.service_url),
            service_api_key: pick(&self.service_api_key, &base.service_api_key),
            collection_name: pick(&self.collection_name, &base.collection_name),
            database_url: pick(&self.database_url, &base.database_url),
            request_timeout_secs: pick(&self.request_timeout_secs, &base.request_timeout_secs),
        }
    }
}

impl fmt::Debug for ProviderOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderOverrides")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_deref().map(mask_api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("service_url", &self.service_url)
            .field(
                "service_api_key",
                &self.service_api_key.as_deref().map(mask_api_key),
            )
            .field("collection_name", &self.collection_name)
            .field("database_url", &self.database_url.as_ref().map(|_| "***"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Whether the two slots were configured independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderMode {
    Dual,
    /// Neither slot has settings of its own; the shared settings are
    /// duplicated into both.
    LegacySingle,
}

impl ProviderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dual => "dual",
            Self::LegacySingle => "legacy_single",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub shared: ProviderOverrides,
    pub primary: ProviderOverrides,
    pub secondary: ProviderOverrides,
}

impl ServerConfig {
    /// Load from `path` (or the default config file when present), then
    /// overlay the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loading config file");
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Path to the default config file: `~/.config/twinmem/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn slot(&self, slot: MemorySource) -> &ProviderOverrides {
        match slot {
            MemorySource::Primary => &self.primary,
            MemorySource::Secondary => &self.secondary,
        }
    }

    pub(crate) fn slot_mut(&mut self, slot: MemorySource) -> &mut ProviderOverrides {
        match slot {
            MemorySource::Primary => &mut self.primary,
            MemorySource::Secondary => &mut self.secondary,
        }
    }

    pub fn mode(&self) -> ProviderMode {
        if self.primary.is_empty() && self.secondary.is_empty() {
            ProviderMode::LegacySingle
        } else {
            ProviderMode::Dual
        }
    }

    /// Validate and build the configuration of one slot.
    pub fn resolve(&self, slot: MemorySource) -> Result<ProviderConfig, ConfigError> {
        let merged = self.slot(slot).layered_over(&self.shared);

        let provider_raw = required(merged.provider, slot, "provider")?;
        let provider = LlmProvider::parse(&provider_raw, slot)?;
        let model_name = required(merged.model, slot, "model")?;
        let service_url = required(merged.service_url, slot, "service_url")?;

        let api_key = merged.api_key.unwrap_or_default();
        if provider.requires_api_key() && api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey {
                slot,
                provider: provider.as_str().to_string(),
            });
        }

        let request_timeout_secs = merged
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: format!("{slot}.request_timeout_secs"),
                value: request_timeout_secs.to_string(),
                expected: POSITIVE_SECONDS,
            });
        }

        Ok(ProviderConfig {
            provider,
            api_key,
            base_url: merged.base_url,
            model_name,
            embedding_model: merged.embedding_model,
            service_url: service_url.trim_end_matches('/').to_string(),
            service_api_key: merged.service_api_key,
            collection_name: merged
                .collection_name
                .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
            database_url: merged.database_url,
            request_timeout_secs,
        })
    }
}

fn required(
    value: Option<String>,
    slot: MemorySource,
    field: &'static str,
) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingField { slot, field })
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;

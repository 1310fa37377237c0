use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

use twinmem_core::{ConfigError, MemorySource};

pub const DEFAULT_COLLECTION_NAME: &str = "mem0_memories";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const LLM_TEMPERATURE: f64 = 0.2;
const LLM_MAX_TOKENS: u32 = 2000;
const OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const OPENAI_EMBEDDING_DIMS: u32 = 1536;
const OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text";
const OLLAMA_EMBEDDING_DIMS: u32 = 768;

/// LLM backend family a memory provider is configured with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    OpenRouter,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::OpenRouter => "openrouter",
            Self::Ollama => "ollama",
        }
    }

    /// Hosted providers reject unauthenticated calls; a local Ollama does not.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }

    pub(crate) fn parse(raw: &str, slot: MemorySource) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::UnsupportedProvider {
                slot,
                provider: raw.to_string(),
            }),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fully resolved configuration of one provider slot.
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider: LlmProvider,
    /// API key of the LLM provider, forwarded to the memory service.
    pub api_key: String,
    /// LLM endpoint override (OpenRouter, self-hosted Ollama).
    pub base_url: Option<String>,
    pub model_name: String,
    pub embedding_model: Option<String>,
    /// Base URL of the mem0-compatible memory service.
    pub service_url: String,
    pub service_api_key: Option<String>,
    pub collection_name: String,
    /// Vector store connection string handed to the memory service.
    pub database_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl ProviderConfig {
    pub fn provider_name(&self) -> &'static str {
        self.provider.as_str()
    }

    /// Embedding model, falling back to the provider family default.
    pub fn resolved_embedding_model(&self) -> Option<&str> {
        if let Some(model) = self.embedding_model.as_deref() {
            return Some(model);
        }
        match self.provider {
            LlmProvider::OpenAi => Some(OPENAI_EMBEDDING_MODEL),
            LlmProvider::Ollama => Some(OLLAMA_EMBEDDING_MODEL),
            LlmProvider::OpenRouter => None,
        }
    }

    fn embedding_dims(&self) -> u32 {
        match self.provider {
            LlmProvider::OpenAi => OPENAI_EMBEDDING_DIMS,
            _ => OLLAMA_EMBEDDING_DIMS,
        }
    }

    /// Backend configuration posted to the memory service's `/configure`.
    ///
    /// OpenRouter has no embedding endpoint, so no embedder is configured and
    /// the service keeps its own default.
    pub fn backend_payload(&self) -> Value {
        let mut llm_config = json!({
            "model": self.model_name,
            "temperature": LLM_TEMPERATURE,
            "max_tokens": LLM_MAX_TOKENS,
        });
        if !self.api_key.is_empty() {
            llm_config["api_key"] = json!(self.api_key);
        }
        if let Some(base_url) = &self.base_url {
            let key = match self.provider {
                LlmProvider::Ollama => "ollama_base_url",
                _ => "base_url",
            };
            llm_config[key] = json!(base_url);
        }

        let mut payload = json!({
            "llm": {
                "provider": self.provider_name(),
                "config": llm_config,
            },
            "vector_store": {
                "provider": "supabase",
                "config": {
                    "connection_string": self.database_url.clone().unwrap_or_default(),
                    "collection_name": self.collection_name,
                    "embedding_model_dims": self.embedding_dims(),
                }
            }
        });

        if self.provider != LlmProvider::OpenRouter {
            let mut embedder_config = json!({
                "model": self.resolved_embedding_model(),
                "embedding_dims": self.embedding_dims(),
            });
            match self.provider {
                LlmProvider::OpenAi if !self.api_key.is_empty() => {
                    embedder_config["api_key"] = json!(self.api_key);
                }
                LlmProvider::Ollama => {
                    if let Some(base_url) = &self.base_url {
                        embedder_config["ollama_base_url"] = json!(base_url);
                    }
                }
                _ => {}
            }
            payload["embedder"] = json!({
                "provider": self.provider_name(),
                "config": embedder_config,
            });
        }

        payload
    }

    pub fn redacted_api_key(&self) -> String {
        mask_api_key(&self.api_key)
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.redacted_api_key())
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
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

impl fmt::Display for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "provider={}, model=\"{}\", embedding_model=\"{}\", service_url=\"{}\", collection=\"{}\", api_key=\"{}\"",
            self.provider,
            self.model_name,
            self.resolved_embedding_model().unwrap_or("-"),
            self.service_url,
            self.collection_name,
            self.redacted_api_key()
        )
    }
}

/// Keys shorter than this show only their last two characters.
const MIN_PARTIAL_MASK_CHARS: usize = 8;

/// Mask a secret for logs and `config show`.
pub fn mask_api_key(api_key: &str) -> String {
    let chars: Vec<char> = api_key.chars().collect();
    let count = chars.len();

    if count < MIN_PARTIAL_MASK_CHARS {
        let shown = if count > 2 { 2 } else { 0 };
        let suffix: String = chars[count - shown..].iter().collect();
        return format!("{}{suffix}", "*".repeat(count - shown));
    }

    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[count - 4..].iter().collect();
    format!("{prefix}...{suffix}")
}

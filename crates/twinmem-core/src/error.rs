use crate::types::MemorySource;

/// Invalid or incomplete provider/server configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{slot} provider: missing required setting '{field}'")]
    MissingField {
        slot: MemorySource,
        field: &'static str,
    },

    #[error(
        "{slot} provider: unsupported LLM provider '{provider}' (expected openai, openrouter or ollama)"
    )]
    UnsupportedProvider {
        slot: MemorySource,
        provider: String,
    },

    #[error("{slot} provider: '{provider}' requires an API key")]
    MissingApiKey {
        slot: MemorySource,
        provider: String,
    },

    #[error("Invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// Failure of a single provider call. Never escapes the replication layer.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("provider is not configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Request(String),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unrecognized provider response: {0}")]
    MalformedResponse(String),
}

/// Caller-visible input errors of the memory operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("memory content is empty")]
    EmptyContent,
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use serde_json::{Value, json};
use tracing::debug;

use twinmem_config::ProviderConfig;
use twinmem_core::{Metadata, ProviderError, StoredMemory};

use crate::client::ProviderClient;
use crate::normalize::normalize_records;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Client for a mem0-compatible REST memory service.
#[derive(Debug)]
pub struct HttpProviderClient {
    service_url: String,
    service_api_key: Option<String>,
    backend_payload: Value,
    client: reqwest::Client,
}

impl HttpProviderClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            service_url: config.service_url.trim_end_matches('/').to_string(),
            service_api_key: config.service_api_key.clone(),
            backend_payload: config.backend_payload(),
            client,
        })
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// Push the LLM / embedder / vector store settings to the service.
    pub async fn configure(&self) -> Result<(), ProviderError> {
        let url = self.url("/configure")?;
        self.send(self.client.post(url).json(&self.backend_payload))
            .await?;
        Ok(())
    }

    fn url(&self, path: &str) -> Result<Url, ProviderError> {
        Url::parse(&format!("{}{}", self.service_url, path)).map_err(|e| {
            ProviderError::Request(format!("invalid service URL '{}': {e}", self.service_url))
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, ProviderError> {
        let request = match &self.service_api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::MalformedResponse(format!("invalid JSON: {e}")))
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn add(
        &self,
        content: &str,
        user_id: &str,
        metadata: Option<&Metadata>,
    ) -> Result<Value, ProviderError> {
        let mut body = json!({
            "messages": [{"role": "user", "content": content}],
            "user_id": user_id,
        });
        if let Some(metadata) = metadata {
            body["metadata"] = Value::Object(metadata.clone());
        }

        let url = self.url("/memories")?;
        debug!(service = %self.service_url, "adding memory");
        self.send(self.client.post(url).json(&body)).await
    }

    async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMemory>, ProviderError> {
        let body = json!({
            "query": query,
            "user_id": user_id,
            "limit": limit,
        });
        let url = self.url("/search")?;
        let response = self.send(self.client.post(url).json(&body)).await?;
        normalize_records(response)
    }

    async fn get_all(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredMemory>, ProviderError> {
        let mut url = self.url("/memories")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("user_id", user_id);
            if let Some(limit) = limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        let response = self.send(self.client.get(url)).await?;
        normalize_records(response)
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

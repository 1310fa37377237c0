//! Environment overlay.
//!
//! Per-slot keys carry a `PRIMARY_` / `SECONDARY_` prefix; the same keys
//! without a prefix feed the shared (legacy single-provider) settings.

use twinmem_core::{ConfigError, MemorySource};

use crate::server::{POSITIVE_SECONDS, ProviderOverrides, ServerConfig, Transport};

const KEY_PROVIDER: &str = "LLM_PROVIDER";
const KEY_API_KEY: &str = "LLM_API_KEY";
const KEY_BASE_URL: &str = "LLM_BASE_URL";
const KEY_MODEL: &str = "LLM_CHOICE";
const KEY_EMBEDDING_MODEL: &str = "EMBEDDING_MODEL_CHOICE";
const KEY_SERVICE_URL: &str = "MEMORY_URL";
const KEY_SERVICE_API_KEY: &str = "MEMORY_API_KEY";
const KEY_COLLECTION: &str = "COLLECTION";
const KEY_DATABASE_URL: &str = "DATABASE_URL";
const KEY_TIMEOUT: &str = "MEMORY_TIMEOUT_SECS";

const KEY_HOST: &str = "HOST";
const KEY_PORT: &str = "PORT";
const KEY_TRANSPORT: &str = "TRANSPORT";
const KEY_USER_ID: &str = "MEMORY_USER_ID";

fn slot_prefix(slot: MemorySource) -> &'static str {
    match slot {
        MemorySource::Primary => "PRIMARY_",
        MemorySource::Secondary => "SECONDARY_",
    }
}

impl ServerConfig {
    /// Overlay values from `lookup` (normally `std::env::var`). Blank values
    /// count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(host) = get(KEY_HOST) {
            self.server.host = host;
        }
        if let Some(port) = get(KEY_PORT) {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: KEY_PORT.to_string(),
                value: port.clone(),
                expected: "a port number",
            })?;
        }
        if let Some(transport) = get(KEY_TRANSPORT) {
            self.server.transport = transport.parse::<Transport>()?;
        }
        if let Some(user_id) = get(KEY_USER_ID) {
            self.server.user_id = user_id;
        }

        overlay_provider(&mut self.shared, "", &get)?;
        for slot in MemorySource::ALL {
            overlay_provider(self.slot_mut(slot), slot_prefix(slot), &get)?;
        }
        Ok(())
    }
}

fn overlay_provider<G>(
    target: &mut ProviderOverrides,
    prefix: &str,
    get: &G,
) -> Result<(), ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let key = |name: &str| format!("{prefix}{name}");
    let set = |field: &mut Option<String>, name: &str| {
        if let Some(value) = get(&key(name)) {
            *field = Some(value);
        }
    };

    set(&mut target.provider, KEY_PROVIDER);
    set(&mut target.api_key, KEY_API_KEY);
    set(&mut target.base_url, KEY_BASE_URL);
    set(&mut target.model, KEY_MODEL);
    set(&mut target.embedding_model, KEY_EMBEDDING_MODEL);
    set(&mut target.service_url, KEY_SERVICE_URL);
    set(&mut target.service_api_key, KEY_SERVICE_API_KEY);
    set(&mut target.collection_name, KEY_COLLECTION);
    set(&mut target.database_url, KEY_DATABASE_URL);

    let timeout_key = key(KEY_TIMEOUT);
    if let Some(raw) = get(&timeout_key) {
        let secs = raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: timeout_key.clone(),
                value: raw.clone(),
                expected: POSITIVE_SECONDS,
            })?;
        target.request_timeout_secs = Some(secs);
    }
    Ok(())
}

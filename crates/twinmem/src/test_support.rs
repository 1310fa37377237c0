//! In-memory provider used by the binary's unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use twinmem_core::{Metadata, ProviderError, StoredMemory};
use twinmem_provider::ProviderClient;
use twinmem_replication::ReplicationManager;

use crate::tools::{MemoryTools, SlotInfo};

#[derive(Default)]
pub(crate) struct FakeProvider {
    memories: Mutex<Vec<String>>,
    down: bool,
}

impl FakeProvider {
    pub(crate) fn with_memories(texts: &[&str]) -> Self {
        Self {
            memories: Mutex::new(texts.iter().map(|t| t.to_string()).collect()),
            down: false,
        }
    }

    pub(crate) fn down() -> Self {
        Self {
            memories: Mutex::default(),
            down: true,
        }
    }

    fn check(&self) -> Result<(), ProviderError> {
        if self.down {
            return Err(ProviderError::Request("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    async fn add(
        &self,
        content: &str,
        _user_id: &str,
        _metadata: Option<&Metadata>,
    ) -> Result<Value, ProviderError> {
        self.check()?;
        self.memories.lock().unwrap().push(content.to_string());
        Ok(json!({"results": [{"event": "ADD"}]}))
    }

    async fn search(
        &self,
        query: &str,
        _user_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMemory>, ProviderError> {
        self.check()?;
        Ok(self
            .memories
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.contains(query))
            .take(limit)
            .map(StoredMemory::new)
            .collect())
    }

    async fn get_all(
        &self,
        _user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredMemory>, ProviderError> {
        self.check()?;
        let memories = self.memories.lock().unwrap();
        Ok(memories
            .iter()
            .take(limit.unwrap_or(memories.len()))
            .map(StoredMemory::new)
            .collect())
    }
}

pub(crate) fn slot(provider: &str, model: &str) -> SlotInfo {
    SlotInfo {
        provider: provider.to_string(),
        model: model.to_string(),
    }
}

pub(crate) fn tools(primary: FakeProvider, secondary: FakeProvider) -> MemoryTools {
    MemoryTools::new(
        ReplicationManager::new(Some(Box::new(primary)), Some(Box::new(secondary))),
        "user",
        slot("openai", "gpt-4o-mini"),
        slot("ollama", "llama3.1"),
    )
}

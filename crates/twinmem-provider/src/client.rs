use async_trait::async_trait;
use serde_json::Value;

use twinmem_core::{Metadata, ProviderError, StoredMemory};

/// Operations the replication layer needs from one memory provider.
///
/// Each call is atomic from the caller's point of view: it either returns a
/// complete result or an error, never a partial one.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Store `content` for `user_id`; returns the provider's opaque response.
    async fn add(
        &self,
        content: &str,
        user_id: &str,
        metadata: Option<&Metadata>,
    ) -> Result<Value, ProviderError>;

    /// Semantic search, in the provider's own relevance order.
    async fn search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMemory>, ProviderError>;

    /// Every memory of `user_id`, optionally capped at `limit`.
    async fn get_all(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredMemory>, ProviderError>;
}

use std::future::Future;

use serde_json::Value;
use tracing::{debug, info, warn};

use twinmem_core::{
    HealthStatus, Metadata, MemoryError, MemoryRecord, MemorySource, ProviderError, StoredMemory,
    SyncReport, WriteOutcome,
};
use twinmem_provider::ProviderClient;

use crate::content::MemoryContent;
use crate::merge::merge_legs;
use crate::similarity::is_duplicate;

const HEALTH_PROBE_LIMIT: usize = 1;

/// Replicates memories across a primary and a secondary provider.
///
/// A slot whose client could not be built is `None` and behaves like a
/// provider that fails every call. Provider failures never escape: they are
/// logged and folded into the returned outcome.
pub struct ReplicationManager {
    primary: Option<Box<dyn ProviderClient>>,
    secondary: Option<Box<dyn ProviderClient>>,
}

impl ReplicationManager {
    pub fn new(
        primary: Option<Box<dyn ProviderClient>>,
        secondary: Option<Box<dyn ProviderClient>>,
    ) -> Self {
        if primary.is_none() && secondary.is_none() {
            warn!("no memory provider is configured; every operation will come back empty");
        }
        Self { primary, secondary }
    }

    pub fn is_configured(&self, source: MemorySource) -> bool {
        self.client(source).is_some()
    }

    fn client(&self, source: MemorySource) -> Option<&dyn ProviderClient> {
        match source {
            MemorySource::Primary => self.primary.as_deref(),
            MemorySource::Secondary => self.secondary.as_deref(),
        }
    }

    /// Run `call` against both slots concurrently.
    async fn fan_out<'a, T, F, Fut>(
        &'a self,
        call: F,
    ) -> (Result<T, ProviderError>, Result<T, ProviderError>)
    where
        F: Fn(&'a dyn ProviderClient) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>> + 'a,
    {
        let primary = self.client(MemorySource::Primary).map(&call);
        let secondary = self.client(MemorySource::Secondary).map(&call);
        tokio::join!(settle(primary), settle(secondary))
    }

    /// Store `content` on both providers unless it duplicates an existing
    /// memory of `user_id`.
    ///
    /// Duplicate detection reads the merged history of both providers before
    /// every write, so its cost grows linearly with that history.
    pub async fn add(
        &self,
        content: impl Into<MemoryContent>,
        user_id: &str,
        metadata: Option<&Metadata>,
    ) -> Result<WriteOutcome, MemoryError> {
        let content = content.into().flatten();
        if content.is_empty() {
            return Err(MemoryError::EmptyContent);
        }

        let existing = self.get_all(user_id).await;
        if let Some(duplicate) = existing
            .iter()
            .find(|record| is_duplicate(&content, &record.text))
        {
            info!(
                user_id,
                source = %duplicate.source,
                "memory already exists; skipping write"
            );
            return Ok(WriteOutcome::already_exists());
        }

        let (primary, secondary) = self
            .fan_out(|client| client.add(&content, user_id, metadata))
            .await;
        let outcome = WriteOutcome::from_results(
            keep_write(MemorySource::Primary, primary),
            keep_write(MemorySource::Secondary, secondary),
        );

        if outcome.synchronized {
            info!(user_id, "memory written to both providers");
        } else {
            warn!(
                user_id,
                primary = outcome.primary.is_some(),
                secondary = outcome.secondary.is_some(),
                "memory replication incomplete"
            );
        }
        Ok(outcome)
    }

    /// Search both providers and merge, primary results first.
    ///
    /// The merged order is not a global relevance ranking: each provider's
    /// own order is kept and primary records come before secondary ones.
    pub async fn search(&self, query: &str, user_id: &str, limit: usize) -> Vec<MemoryRecord> {
        if limit == 0 {
            return Vec::new();
        }

        let (primary, secondary) = self
            .fan_out(|client| client.search(query, user_id, limit))
            .await;
        let mut merged = merge_legs(
            keep_records(MemorySource::Primary, "search", primary),
            keep_records(MemorySource::Secondary, "search", secondary),
        );
        merged.truncate(limit);
        debug!(user_id, limit, results = merged.len(), "merged search results");
        merged
    }

    /// Every memory of `user_id` from both providers, deduplicated.
    pub async fn get_all(&self, user_id: &str) -> Vec<MemoryRecord> {
        let (primary, secondary) = self.fan_out(|client| client.get_all(user_id, None)).await;
        merge_legs(
            keep_records(MemorySource::Primary, "get_all", primary),
            keep_records(MemorySource::Secondary, "get_all", secondary),
        )
    }

    /// Probe each provider with a minimal listing.
    pub async fn health_check(&self, user_id: &str) -> HealthStatus {
        let (primary, secondary) = self
            .fan_out(|client| client.get_all(user_id, Some(HEALTH_PROBE_LIMIT)))
            .await;
        let status = HealthStatus {
            primary: probe_ok(MemorySource::Primary, primary),
            secondary: probe_ok(MemorySource::Secondary, secondary),
        };
        debug!(?status, "provider health checked");
        status
    }

    /// Compare raw record counts of both providers.
    ///
    /// Detection only: drift is reported, never repaired. A provider that
    /// fails to answer counts as holding nothing.
    pub async fn sync_providers(&self, user_id: &str) -> SyncReport {
        let (primary, secondary) = self.fan_out(|client| client.get_all(user_id, None)).await;
        let primary = keep_records(MemorySource::Primary, "sync", primary);
        let secondary = keep_records(MemorySource::Secondary, "sync", secondary);

        let report = SyncReport::from_counts(primary.len(), secondary.len());
        info!(
            user_id,
            primary = report.primary_count,
            secondary = report.secondary_count,
            status = report.status.as_str(),
            "provider sync check"
        );
        report
    }
}

async fn settle<T, Fut>(leg: Option<Fut>) -> Result<T, ProviderError>
where
    Fut: Future<Output = Result<T, ProviderError>>,
{
    match leg {
        Some(call) => call.await,
        None => Err(ProviderError::NotConfigured),
    }
}

fn keep_write(source: MemorySource, result: Result<Value, ProviderError>) -> Option<Value> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(%source, %error, "memory write failed");
            None
        }
    }
}

fn keep_records(
    source: MemorySource,
    operation: &'static str,
    result: Result<Vec<StoredMemory>, ProviderError>,
) -> Vec<StoredMemory> {
    match result {
        Ok(records) => records,
        Err(error) => {
            warn!(%source, operation, %error, "provider read failed; using no results");
            Vec::new()
        }
    }
}

fn probe_ok(source: MemorySource, result: Result<Vec<StoredMemory>, ProviderError>) -> bool {
    match result {
        Ok(_) => true,
        Err(error) => {
            warn!(%source, %error, "provider health probe failed");
            false
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use twinmem_core::{OverallHealth, SyncStatus, WriteStatus};

use super::*;
use crate::content::Message;

#[derive(Default)]
struct FakeState {
    memories: Mutex<Vec<StoredMemory>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    writes: AtomicUsize,
    get_all_limits: Mutex<Vec<Option<usize>>>,
}

/// In-memory provider; clones share state so tests can inspect it after the
/// manager takes ownership.
#[derive(Clone, Default)]
struct FakeProvider {
    state: Arc<FakeState>,
}

impl FakeProvider {
    fn with_memories(texts: &[&str]) -> Self {
        let provider = Self::default();
        provider
            .state
            .memories
            .lock()
            .unwrap()
            .extend(texts.iter().map(|t| StoredMemory::new(*t)));
        provider
    }

    fn failing() -> Self {
        let provider = Self::default();
        provider.state.fail_writes.store(true, Ordering::SeqCst);
        provider.state.fail_reads.store(true, Ordering::SeqCst);
        provider
    }

    fn fail_writes(self) -> Self {
        self.state.fail_writes.store(true, Ordering::SeqCst);
        self
    }

    fn fail_reads(self) -> Self {
        self.state.fail_reads.store(true, Ordering::SeqCst);
        self
    }

    fn writes(&self) -> usize {
        self.state.writes.load(Ordering::SeqCst)
    }

    fn texts(&self) -> Vec<String> {
        self.state
            .memories
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.text.clone())
            .collect()
    }

    fn boxed(&self) -> Option<Box<dyn ProviderClient>> {
        Some(Box::new(self.clone()))
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
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(ProviderError::Status {
                status: 500,
                body: "write rejected".to_string(),
            });
        }
        let id = self.state.writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.state
            .memories
            .lock()
            .unwrap()
            .push(StoredMemory::new(content));
        Ok(json!({"results": [{"id": id, "event": "ADD"}]}))
    }

    // Returns every match regardless of `limit`, like providers that
    // over-fetch.
    async fn search(
        &self,
        query: &str,
        _user_id: &str,
        _limit: usize,
    ) -> Result<Vec<StoredMemory>, ProviderError> {
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(ProviderError::Request("connection refused".to_string()));
        }
        Ok(self
            .state
            .memories
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.text.contains(query))
            .cloned()
            .collect())
    }

    async fn get_all(
        &self,
        _user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<StoredMemory>, ProviderError> {
        self.state.get_all_limits.lock().unwrap().push(limit);
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(ProviderError::Request("connection refused".to_string()));
        }
        let memories = self.state.memories.lock().unwrap();
        let cap = limit.unwrap_or(memories.len());
        Ok(memories.iter().take(cap).cloned().collect())
    }
}

fn manager(primary: &FakeProvider, secondary: &FakeProvider) -> ReplicationManager {
    ReplicationManager::new(primary.boxed(), secondary.boxed())
}

// --- add ---

#[tokio::test]
async fn add_writes_identical_content_to_both_providers() {
    let (primary, secondary) = (FakeProvider::default(), FakeProvider::default());
    let manager = manager(&primary, &secondary);

    let outcome = manager.add("  prefers dark mode ", "user", None).await.unwrap();

    assert!(outcome.synchronized);
    assert!(!outcome.already_exists);
    assert!(outcome.primary.is_some() && outcome.secondary.is_some());
    assert_eq!(primary.texts(), ["prefers dark mode"]);
    assert_eq!(secondary.texts(), ["prefers dark mode"]);
}

#[tokio::test]
async fn repeated_add_is_suppressed_without_writes() {
    let (primary, secondary) = (FakeProvider::default(), FakeProvider::default());
    let manager = manager(&primary, &secondary);

    manager.add("likes green tea", "user", None).await.unwrap();
    let second = manager.add("Likes green tea ", "user", None).await.unwrap();

    assert_eq!(second, WriteOutcome::already_exists());
    assert_eq!(primary.writes(), 1);
    assert_eq!(secondary.writes(), 1);
}

#[tokio::test]
async fn duplicate_held_by_one_provider_only_still_blocks_writes() {
    let primary = FakeProvider::default();
    let secondary = FakeProvider::with_memories(&["works remotely on fridays"]);
    let manager = manager(&primary, &secondary);

    let outcome = manager
        .add("works remotely on fridays", "user", None)
        .await
        .unwrap();

    assert_eq!(outcome.status(), WriteStatus::AlreadyExists);
    assert_eq!(primary.writes(), 0);
    assert_eq!(secondary.writes(), 0);
}

#[tokio::test]
async fn long_near_duplicate_is_rejected() {
    let primary = FakeProvider::with_memories(&["a b c d e f g h i j k l m n"]);
    let secondary = FakeProvider::default();
    let manager = manager(&primary, &secondary);

    let outcome = manager
        .add("a b c d e f g h i j k l m", "user", None)
        .await
        .unwrap();

    assert!(outcome.already_exists);
    assert_eq!(primary.writes() + secondary.writes(), 0);
}

#[tokio::test]
async fn short_reordered_content_is_not_a_duplicate() {
    let primary = FakeProvider::with_memories(&["alpha beta"]);
    let secondary = FakeProvider::with_memories(&["alpha beta"]);
    let manager = manager(&primary, &secondary);

    let outcome = manager.add("beta alpha", "user", None).await.unwrap();

    assert!(!outcome.already_exists);
    assert!(outcome.synchronized);
    assert_eq!(primary.writes(), 1);
}

#[tokio::test]
async fn primary_write_failure_is_reported_not_raised() {
    let primary = FakeProvider::default().fail_writes();
    let secondary = FakeProvider::default();
    let manager = manager(&primary, &secondary);

    let outcome = manager.add("owns a bicycle", "user", None).await.unwrap();

    assert!(!outcome.synchronized);
    assert!(outcome.primary.is_none());
    assert_eq!(
        outcome.secondary,
        Some(json!({"results": [{"id": 1, "event": "ADD"}]}))
    );
    assert_eq!(
        outcome.status(),
        WriteStatus::Partial(MemorySource::Secondary)
    );
    assert_eq!(secondary.texts(), ["owns a bicycle"]);
}

#[tokio::test]
async fn total_write_failure_is_an_outcome() {
    let (primary, secondary) = (FakeProvider::failing(), FakeProvider::failing());
    let manager = manager(&primary, &secondary);

    let outcome = manager.add("owns a bicycle", "user", None).await.unwrap();

    assert_eq!(outcome.status(), WriteStatus::Failed);
    assert!(!outcome.synchronized);
}

#[tokio::test]
async fn unreadable_provider_does_not_block_writes() {
    let primary = FakeProvider::default().fail_reads();
    let secondary = FakeProvider::default();
    let manager = manager(&primary, &secondary);

    let outcome = manager.add("speaks portuguese", "user", None).await.unwrap();

    assert!(outcome.synchronized);
    assert_eq!(primary.writes(), 1);
}

#[tokio::test]
async fn unconfigured_slot_yields_partial_write() {
    let secondary = FakeProvider::default();
    let manager = ReplicationManager::new(None, secondary.boxed());
    assert!(!manager.is_configured(MemorySource::Primary));

    let outcome = manager.add("speaks portuguese", "user", None).await.unwrap();

    assert_eq!(
        outcome.status(),
        WriteStatus::Partial(MemorySource::Secondary)
    );
}

#[tokio::test]
async fn empty_content_is_rejected_before_any_call() {
    let (primary, secondary) = (FakeProvider::default(), FakeProvider::default());
    let manager = manager(&primary, &secondary);

    let err = manager.add(" \n\t ", "user", None).await.unwrap_err();

    assert_eq!(err, MemoryError::EmptyContent);
    assert!(primary.state.get_all_limits.lock().unwrap().is_empty());
    assert_eq!(primary.writes(), 0);
}

#[tokio::test]
async fn message_content_is_flattened_before_writing() {
    let (primary, secondary) = (FakeProvider::default(), FakeProvider::default());
    let manager = manager(&primary, &secondary);

    let messages = vec![Message::user(" moved to Lisbon "), Message::user("in 2023 ")];
    manager.add(messages, "user", None).await.unwrap();

    assert_eq!(primary.texts(), ["moved to Lisbon in 2023"]);
}

// --- search / get_all ---

#[tokio::test]
async fn search_truncates_and_keeps_primary_duplicates() {
    let primary = FakeProvider::with_memories(&["x one", "x two", "x three"]);
    let secondary = FakeProvider::with_memories(&["x two", "x one", "x five"]);
    let manager = manager(&primary, &secondary);

    let results = manager.search("x", "user", 2).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.source == MemorySource::Primary));
    assert_eq!(results[0].text, "x one");
    assert_eq!(results[1].text, "x two");
}

#[tokio::test]
async fn search_merges_primary_before_secondary() {
    let primary = FakeProvider::with_memories(&["x one", "x two", "x three"]);
    let secondary = FakeProvider::with_memories(&["x two", "x one", "x five"]);
    let manager = manager(&primary, &secondary);

    let results = manager.search("x", "user", 10).await;
    let view: Vec<(&str, MemorySource)> =
        results.iter().map(|r| (r.text.as_str(), r.source)).collect();

    assert_eq!(
        view,
        [
            ("x one", MemorySource::Primary),
            ("x two", MemorySource::Primary),
            ("x three", MemorySource::Primary),
            ("x five", MemorySource::Secondary),
        ]
    );
}

#[tokio::test]
async fn search_returns_partial_results_when_one_leg_fails() {
    let primary = FakeProvider::with_memories(&["x one"]).fail_reads();
    let secondary = FakeProvider::with_memories(&["x five"]);
    let manager = manager(&primary, &secondary);

    let results = manager.search("x", "user", 3).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source, MemorySource::Secondary);
}

#[tokio::test]
async fn search_with_zero_limit_is_empty() {
    let primary = FakeProvider::with_memories(&["x one"]);
    let manager = manager(&primary, &FakeProvider::default());
    assert!(manager.search("x", "user", 0).await.is_empty());
}

#[tokio::test]
async fn get_all_merges_without_truncation() {
    let primary = FakeProvider::with_memories(&["a", "b", "c"]);
    let secondary = FakeProvider::with_memories(&["c", "d", "e"]);
    let manager = manager(&primary, &secondary);

    let all = manager.get_all("user").await;

    let texts: Vec<&str> = all.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, ["a", "b", "c", "d", "e"]);
    assert_eq!(*primary.state.get_all_limits.lock().unwrap(), [None]);
}

#[tokio::test]
async fn get_all_with_both_providers_down_is_empty() {
    let manager = manager(&FakeProvider::failing(), &FakeProvider::failing());
    assert!(manager.get_all("user").await.is_empty());
}

// --- health / sync ---

#[tokio::test]
async fn health_reports_each_leg_independently() {
    let primary = FakeProvider::failing();
    let secondary = FakeProvider::with_memories(&["a", "b"]);
    let manager = manager(&primary, &secondary);

    let health = manager.health_check("user").await;

    assert_eq!(
        health,
        HealthStatus {
            primary: false,
            secondary: true,
        }
    );
    assert_eq!(health.overall(), OverallHealth::Healthy);
    assert_eq!(
        *secondary.state.get_all_limits.lock().unwrap(),
        [Some(HEALTH_PROBE_LIMIT)]
    );
}

#[tokio::test]
async fn health_is_critical_without_live_providers() {
    let manager = ReplicationManager::new(None, FakeProvider::failing().boxed());
    let health = manager.health_check("user").await;
    assert_eq!(health, HealthStatus::default());
    assert_eq!(health.overall(), OverallHealth::Critical);
}

#[tokio::test]
async fn sync_counts_raw_records() {
    // Duplicates inside one provider still count.
    let primary = FakeProvider::with_memories(&["a", "a", "b"]);
    let secondary = FakeProvider::with_memories(&["a", "b", "c"]);
    let manager = manager(&primary, &secondary);

    let report = manager.sync_providers("user").await;

    assert_eq!(report.primary_count, 3);
    assert_eq!(report.secondary_count, 3);
    assert_eq!(report.status, SyncStatus::Synchronized);
}

#[tokio::test]
async fn sync_detects_drift_without_repairing() {
    let primary = FakeProvider::with_memories(&["a", "b"]);
    let secondary = FakeProvider::with_memories(&["a"]);
    let manager = manager(&primary, &secondary);

    let report = manager.sync_providers("user").await;

    assert_eq!(report.status, SyncStatus::NeedsSync);
    assert_eq!(secondary.writes(), 0);
    assert_eq!(secondary.texts(), ["a"]);
}

#[tokio::test]
async fn sync_counts_failed_leg_as_empty() {
    let primary = FakeProvider::with_memories(&["a"]);
    let manager = manager(&primary, &FakeProvider::failing());

    let report = manager.sync_providers("user").await;

    assert_eq!((report.primary_count, report.secondary_count), (1, 0));
    assert_eq!(report.status, SyncStatus::NeedsSync);
}

// --- concurrency ---

/// Provider whose every call blocks until the other provider's matching call
/// arrives. Both legs only finish when they are in flight together.
struct RendezvousProvider {
    barrier: Arc<tokio::sync::Barrier>,
}

#[async_trait]
impl ProviderClient for RendezvousProvider {
    async fn add(
        &self,
        _content: &str,
        _user_id: &str,
        _metadata: Option<&Metadata>,
    ) -> Result<Value, ProviderError> {
        self.barrier.wait().await;
        Ok(json!({"results": []}))
    }

    async fn search(
        &self,
        query: &str,
        _user_id: &str,
        _limit: usize,
    ) -> Result<Vec<StoredMemory>, ProviderError> {
        self.barrier.wait().await;
        Ok(vec![StoredMemory::new(query)])
    }

    async fn get_all(
        &self,
        _user_id: &str,
        _limit: Option<usize>,
    ) -> Result<Vec<StoredMemory>, ProviderError> {
        self.barrier.wait().await;
        Ok(Vec::new())
    }
}

fn rendezvous_manager() -> ReplicationManager {
    let barrier = Arc::new(tokio::sync::Barrier::new(2));
    let leg = || -> Option<Box<dyn ProviderClient>> {
        Some(Box::new(RendezvousProvider {
            barrier: barrier.clone(),
        }))
    };
    ReplicationManager::new(leg(), leg())
}

#[tokio::test]
async fn both_provider_legs_run_concurrently() {
    use std::time::Duration;
    use tokio::time::timeout;

    let manager = rendezvous_manager();
    let deadline = Duration::from_secs(5);

    let outcome = timeout(deadline, manager.add("walks to work", "user", None))
        .await
        .expect("add legs ran one after the other")
        .unwrap();
    assert!(outcome.synchronized);

    let found = timeout(deadline, manager.search("walks", "user", 5))
        .await
        .expect("search legs ran one after the other");
    assert_eq!(found.len(), 1);

    let health = timeout(deadline, manager.health_check("user"))
        .await
        .expect("health legs ran one after the other");
    assert!(health.primary && health.secondary);

    let report = timeout(deadline, manager.sync_providers("user"))
        .await
        .expect("sync legs ran one after the other");
    assert_eq!(report.status, SyncStatus::Synchronized);
}

use serde::Serialize;
use tracing::debug;

use twinmem_config::ProviderConfig;
use twinmem_core::{MemoryRecord, MemorySource, WriteStatus};
use twinmem_replication::ReplicationManager;

pub(crate) const DEFAULT_SEARCH_LIMIT: usize = 3;

const SAVE_ERROR: &str = "Error saving memory: ";
const LIST_ERROR: &str = "Error retrieving memories: ";
const SEARCH_ERROR: &str = "Error searching memories: ";
const HEALTH_ERROR: &str = "Error checking provider health: ";
const SYNC_ERROR: &str = "Error during provider synchronization: ";

const ECHO_CHARS: usize = 100;
const FAILED_ECHO_CHARS: usize = 50;
const UNCONFIGURED: &str = "unconfigured";

/// Text returned by a memory tool. Errors are rendered, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Provider name and model shown in health reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SlotInfo {
    pub provider: String,
    pub model: String,
}

impl SlotInfo {
    pub(crate) fn unconfigured() -> Self {
        Self {
            provider: UNCONFIGURED.to_string(),
            model: UNCONFIGURED.to_string(),
        }
    }
}

impl From<&ProviderConfig> for SlotInfo {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            provider: config.provider_name().to_string(),
            model: config.model_name.clone(),
        }
    }
}

#[derive(Serialize)]
struct MemoryView<'a> {
    memory: &'a str,
    source: MemorySource,
}

#[derive(Serialize)]
struct SlotHealth<'a> {
    status: &'static str,
    provider: &'a str,
    model: &'a str,
}

#[derive(Serialize)]
struct HealthReport<'a> {
    primary_provider: SlotHealth<'a>,
    secondary_provider: SlotHealth<'a>,
    overall_status: &'static str,
}

#[derive(Serialize)]
struct SyncView {
    primary_count: usize,
    secondary_count: usize,
    sync_status: &'static str,
    timestamp: String,
}

/// The five memory tools, scoped to one user.
pub(crate) struct MemoryTools {
    manager: ReplicationManager,
    user_id: String,
    primary: SlotInfo,
    secondary: SlotInfo,
}

impl MemoryTools {
    pub(crate) fn new(
        manager: ReplicationManager,
        user_id: impl Into<String>,
        primary: SlotInfo,
        secondary: SlotInfo,
    ) -> Self {
        Self {
            manager,
            user_id: user_id.into(),
            primary,
            secondary,
        }
    }

    pub(crate) async fn save_memory(&self, text: &str) -> ToolOutput {
        let outcome = match self.manager.add(text, &self.user_id, None).await {
            Ok(outcome) => outcome,
            Err(e) => return ToolOutput::error(format!("{SAVE_ERROR}{e}")),
        };

        match outcome.status() {
            WriteStatus::AlreadyExists => ToolOutput::ok(format!(
                "Memory already exists in database{}: {}",
                note_if_cut(text, " (not duplicated)"),
                echo(text, ECHO_CHARS)
            )),
            WriteStatus::Synchronized => ToolOutput::ok(format!(
                "Successfully saved memory to both providers: {}",
                echo(text, ECHO_CHARS)
            )),
            WriteStatus::Partial(source) => ToolOutput::ok(format!(
                "Memory saved to {source} provider only{}: {}",
                note_if_cut(text, " (sync failed)"),
                echo(text, ECHO_CHARS)
            )),
            WriteStatus::Failed => ToolOutput::error(format!(
                "Failed to save memory to both providers: {}",
                echo(text, FAILED_ECHO_CHARS)
            )),
        }
    }

    pub(crate) async fn get_all_memories(&self) -> ToolOutput {
        let records = self.manager.get_all(&self.user_id).await;
        debug!(count = records.len(), "listing memories");
        render(&memory_views(&records), LIST_ERROR)
    }

    pub(crate) async fn search_memories(&self, query: &str, limit: usize) -> ToolOutput {
        if query.trim().is_empty() {
            return ToolOutput::error(format!("{SEARCH_ERROR}query is empty"));
        }
        if limit == 0 {
            return ToolOutput::error(format!("{SEARCH_ERROR}limit must be at least 1"));
        }
        let records = self.manager.search(query, &self.user_id, limit).await;
        render(&memory_views(&records), SEARCH_ERROR)
    }

    pub(crate) async fn check_provider_health(&self) -> ToolOutput {
        let health = self.manager.health_check(&self.user_id).await;
        let report = HealthReport {
            primary_provider: slot_health(&self.primary, health.get(MemorySource::Primary)),
            secondary_provider: slot_health(&self.secondary, health.get(MemorySource::Secondary)),
            overall_status: health.overall().as_str(),
        };
        render(&report, HEALTH_ERROR)
    }

    pub(crate) async fn sync_providers(&self) -> ToolOutput {
        let report = self.manager.sync_providers(&self.user_id).await;
        let view = SyncView {
            primary_count: report.primary_count,
            secondary_count: report.secondary_count,
            sync_status: report.status.as_str(),
            timestamp: report.checked_at.to_rfc3339(),
        };
        render(&view, SYNC_ERROR)
    }
}

fn memory_views(records: &[MemoryRecord]) -> Vec<MemoryView<'_>> {
    records
        .iter()
        .map(|record| MemoryView {
            memory: &record.text,
            source: record.source,
        })
        .collect()
}

fn slot_health(info: &SlotInfo, healthy: bool) -> SlotHealth<'_> {
    SlotHealth {
        status: if healthy { "healthy" } else { "unhealthy" },
        provider: &info.provider,
        model: &info.model,
    }
}

fn render<T: Serialize>(value: &T, error_prefix: &str) -> ToolOutput {
    match serde_json::to_string_pretty(value) {
        Ok(text) => ToolOutput::ok(text),
        Err(e) => ToolOutput::error(format!("{error_prefix}{e}")),
    }
}

/// `text` cut to `max_chars` characters, with `...` appended when cut.
fn echo(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// `note` when the echo of `text` gets cut, otherwise nothing.
fn note_if_cut<'a>(text: &str, note: &'a str) -> &'a str {
    if text.chars().count() > ECHO_CHARS {
        note
    } else {
        ""
    }
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form metadata attached to a memory.
pub type Metadata = serde_json::Map<String, Value>;

/// Provider slot a record or result belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    Primary,
    Secondary,
}

impl MemorySource {
    pub const ALL: [MemorySource; 2] = [MemorySource::Primary, MemorySource::Secondary];

    /// Returns the lowercase name used in logs, config keys and tool output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One memory as a provider reports it, before it is tagged with its origin.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredMemory {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl StoredMemory {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            id: None,
            metadata: None,
        }
    }
}

/// A memory returned to callers, tagged with the provider it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub text: String,
    pub source: MemorySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl MemoryRecord {
    pub fn from_stored(stored: StoredMemory, source: MemorySource) -> Self {
        Self {
            text: stored.text,
            source,
            id: stored.id,
            metadata: stored.metadata,
        }
    }
}

/// Result of a replicated write.
///
/// `already_exists` implies `synchronized` and that neither provider was
/// written. Otherwise `synchronized` holds exactly when both provider writes
/// returned a result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub primary: Option<Value>,
    pub secondary: Option<Value>,
    pub synchronized: bool,
    pub already_exists: bool,
}

impl WriteOutcome {
    /// Outcome for content that was suppressed as a duplicate.
    pub fn already_exists() -> Self {
        Self {
            primary: None,
            secondary: None,
            synchronized: true,
            already_exists: true,
        }
    }

    pub fn from_results(primary: Option<Value>, secondary: Option<Value>) -> Self {
        let synchronized = primary.is_some() && secondary.is_some();
        Self {
            primary,
            secondary,
            synchronized,
            already_exists: false,
        }
    }

    pub fn status(&self) -> WriteStatus {
        if self.already_exists {
            return WriteStatus::AlreadyExists;
        }
        match (self.primary.is_some(), self.secondary.is_some()) {
            (true, true) => WriteStatus::Synchronized,
            (true, false) => WriteStatus::Partial(MemorySource::Primary),
            (false, true) => WriteStatus::Partial(MemorySource::Secondary),
            (false, false) => WriteStatus::Failed,
        }
    }
}

/// Classification of a [`WriteOutcome`] for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStatus {
    AlreadyExists,
    Synchronized,
    /// Only the named provider holds the write.
    Partial(MemorySource),
    Failed,
}

/// Per-provider reachability, derived fresh on every check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub primary: bool,
    pub secondary: bool,
}

impl HealthStatus {
    pub fn get(&self, source: MemorySource) -> bool {
        match source {
            MemorySource::Primary => self.primary,
            MemorySource::Secondary => self.secondary,
        }
    }

    /// At least one live provider keeps the system healthy.
    pub fn overall(&self) -> OverallHealth {
        if self.primary || self.secondary {
            OverallHealth::Healthy
        } else {
            OverallHealth::Critical
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Healthy,
    Critical,
}

impl OverallHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Critical => "critical",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synchronized,
    NeedsSync,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synchronized => "synchronized",
            Self::NeedsSync => "needs_sync",
        }
    }
}

/// Count-based drift report. Equal counts do not prove equal content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub primary_count: usize,
    pub secondary_count: usize,
    pub status: SyncStatus,
    pub checked_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn from_counts(primary_count: usize, secondary_count: usize) -> Self {
        let status = if primary_count == secondary_count {
            SyncStatus::Synchronized
        } else {
            SyncStatus::NeedsSync
        };
        Self {
            primary_count,
            secondary_count,
            status,
            checked_at: Utc::now(),
        }
    }
}

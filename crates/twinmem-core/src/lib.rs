//! Shared value types and error taxonomy for twinmem.

pub mod error;
pub mod types;

pub use error::{ConfigError, MemoryError, ProviderError};
pub use types::{
    HealthStatus, Metadata, MemoryRecord, MemorySource, OverallHealth, StoredMemory, SyncReport,
    SyncStatus, WriteOutcome, WriteStatus,
};

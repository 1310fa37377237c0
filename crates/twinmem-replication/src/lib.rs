//! Dual-provider replication: every write goes to both providers, every read
//! merges both.

pub mod content;
mod manager;
pub mod merge;
pub mod similarity;

pub use content::{MemoryContent, Message};
pub use manager::ReplicationManager;

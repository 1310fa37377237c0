//! Read-time merge of the two providers' results.
//!
//! Deduplication here is exact on the text as returned. Near-duplicates
//! survive the merge so callers see provider-reported variance; fuzzy
//! matching only gates writes (see [`crate::similarity`]).

use std::collections::HashSet;

use twinmem_core::{MemoryRecord, MemorySource, StoredMemory};

/// Tag every stored memory with the provider it came from.
pub fn tag(stored: Vec<StoredMemory>, source: MemorySource) -> Vec<MemoryRecord> {
    stored
        .into_iter()
        .map(|memory| MemoryRecord::from_stored(memory, source))
        .collect()
}

/// Drop records whose text already appeared earlier; order is preserved.
pub fn dedupe(records: Vec<MemoryRecord>) -> Vec<MemoryRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.text.clone()))
        .collect()
}

/// Primary records first, then secondary, deduplicated.
pub fn merge_legs(primary: Vec<StoredMemory>, secondary: Vec<StoredMemory>) -> Vec<MemoryRecord> {
    let mut combined = tag(primary, MemorySource::Primary);
    combined.extend(tag(secondary, MemorySource::Secondary));
    dedupe(combined)
}

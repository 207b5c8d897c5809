//! Event index: event id → positions in one stream
//!
//! Built once per stream before matching and read-only afterward. Repeated
//! event ids append to the existing list, so discovery order is preserved and
//! nothing is overwritten.

use crate::error::Result;
use crate::record::{read_i64, RecordStream};
use std::collections::HashMap;

/// Mapping from event id to the ordered positions carrying it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventIndex {
    positions: HashMap<i64, Vec<usize>>,
    indexed_records: usize,
}

impl EventIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `stream` by `event_field`, optionally only its first `max_count` records.
    ///
    /// Single pass, O(1) amortized per record.
    pub fn build(
        stream: &dyn RecordStream,
        event_field: &str,
        max_count: Option<usize>,
    ) -> Result<Self> {
        let n = max_count.map_or(stream.len(), |cap| cap.min(stream.len()));
        let mut index = Self::new();
        for position in 0..n {
            let event_id = read_i64(stream, position, event_field)?;
            index.insert(event_id, position);
        }
        tracing::debug!(
            "Indexed {} records of '{}' into {} events",
            n,
            stream.name(),
            index.len()
        );
        Ok(index)
    }

    /// Append `position` under `event_id`
    pub fn insert(&mut self, event_id: i64, position: usize) {
        self.positions.entry(event_id).or_default().push(position);
        self.indexed_records += 1;
    }

    /// Positions carrying `event_id`, in discovery order
    pub fn get(&self, event_id: i64) -> Option<&[usize]> {
        self.positions.get(&event_id).map(Vec::as_slice)
    }

    pub fn contains(&self, event_id: i64) -> bool {
        self.positions.contains_key(&event_id)
    }

    /// Number of distinct event ids
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of positions across all lists
    pub fn indexed_records(&self) -> usize {
        self.indexed_records
    }

    /// Distinct event ids, sorted
    pub fn event_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.positions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Drop every event id that `other` does not contain
    pub fn restrict_to(&mut self, other: &EventIndex) {
        self.positions.retain(|event_id, _| other.contains(*event_id));
        self.indexed_records = self.positions.values().map(Vec::len).sum();
    }
}

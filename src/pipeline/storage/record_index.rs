use std::collections::HashMap;
use tracing::debug;

use crate::domain::CanonicalRecord;

/// Canonical records built so far in one run, keyed by id.
///
/// Insertion order is kept; a secondary index on `source_key` lets sources
/// with differing id schemes meet on the same person.
#[derive(Debug, Default)]
pub struct RecordIndex {
    records: Vec<CanonicalRecord>,
    by_id: HashMap<String, usize>,
    by_source_key: HashMap<String, usize>,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&CanonicalRecord> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CanonicalRecord> {
        let position = *self.by_id.get(id)?;
        self.records.get_mut(position)
    }

    /// Id of the record first seen with `source_key`
    pub fn id_for_source_key(&self, source_key: &str) -> Option<&str> {
        self.by_source_key
            .get(source_key)
            .map(|&i| self.records[i].id.as_str())
    }

    /// Append a new canonical record. Returns `false`, leaving the index
    /// untouched, if its id is already present.
    pub fn insert(&mut self, record: CanonicalRecord) -> bool {
        if self.by_id.contains_key(&record.id) {
            return false;
        }
        let position = self.records.len();
        debug!(id = %record.id, position, "Indexed new canonical record");

        self.by_id.insert(record.id.clone(), position);
        if let Some(key) = &record.source_key {
            self.by_source_key.entry(key.clone()).or_insert(position);
        }
        self.records.push(record);
        true
    }

    /// Pick up a `source_key` set on a record after insertion
    pub fn refresh_source_key(&mut self, id: &str) {
        if let Some(&position) = self.by_id.get(id) {
            if let Some(key) = &self.records[position].source_key {
                self.by_source_key.entry(key.clone()).or_insert(position);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CanonicalRecord> {
        self.records.iter_mut()
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    /// Records in insertion order
    pub fn into_records(self) -> Vec<CanonicalRecord> {
        self.records
    }
}

//! # Sync Catalog Cache
//!
//! Per-run in-memory state shared by all workers of one engine run:
//!
//! - **exists paths**: remote directory id → logical path, for directories
//!   already seen in this run
//! - **excluded**: directory ids whose name matched an exclusion rule
//! - **records**: file records waiting to be flushed to the catalog store
//!
//! A fresh cache is built for every run and dropped with it, so concurrent
//! runs for different jobs never see each other's state. Values are derived
//! facts (the same id always maps to the same path), so concurrent writers
//! racing on one key is harmless.

use bridge_traits::FileRecord;
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SyncCatalogCache {
    exists_paths: DashMap<String, String>,
    excluded: DashSet<String>,
    records: DashMap<String, FileRecord>,
}

impl SyncCatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a directory. Returns `true` the first time an id is seen.
    pub fn mark_exists(&self, dir_id: &str, path: &str) -> bool {
        if self.exists_paths.contains_key(dir_id) {
            return false;
        }
        // Racing inserts for the same id must still report "first" only once.
        match self.exists_paths.entry(dir_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(path.to_string());
                true
            }
        }
    }

    pub fn exists_path(&self, dir_id: &str) -> Option<String> {
        self.exists_paths.get(dir_id).map(|path| path.value().clone())
    }

    /// Record an excluded directory. Returns `true` the first time.
    pub fn exclude(&self, dir_id: &str) -> bool {
        self.excluded.insert(dir_id.to_string())
    }

    pub fn is_excluded(&self, dir_id: &str) -> bool {
        self.excluded.contains(dir_id)
    }

    /// Add a record; a later record with the same id replaces the earlier one.
    pub fn insert(&self, record: FileRecord) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn insert_all(&self, records: impl IntoIterator<Item = FileRecord>) {
        for record in records {
            self.insert(record);
        }
    }

    /// Remove and return every pending record, ordered by id.
    pub fn take_records(&self) -> Vec<FileRecord> {
        let ids: Vec<String> = self.records.iter().map(|r| r.key().clone()).collect();
        let mut records: Vec<FileRecord> = ids
            .into_iter()
            .filter_map(|id| self.records.remove(&id).map(|(_, record)| record))
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn directories_known(&self) -> usize {
        self.exists_paths.len()
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }

    /// Copy of the directory cache, for warming incremental sync.
    pub fn exists_snapshot(&self) -> HashMap<String, String> {
        self.exists_paths
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

use dashmap::DashMap;

use super::RecordStore;
use crate::dao::{models::CacheRecord, storage::StorageResult};

/// Volatile record store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: DashMap<String, CacheRecord>,
}

impl MemoryRecordStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn read(&self, key: &str) -> StorageResult<Option<CacheRecord>> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    fn write(&self, key: &str, record: &CacheRecord) -> StorageResult<()> {
        self.records.insert(key.to_owned(), record.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.records.remove(key);
        Ok(())
    }
}

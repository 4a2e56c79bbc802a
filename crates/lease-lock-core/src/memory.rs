//! In-process lock store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::error::LockResult;
use crate::record::{LockRecord, NewLockRecord, RecordId};
use crate::store::{InsertOutcome, LockStore, RecordMatch, RecordUpdate};

/// A [`LockStore`] keeping records in process memory.
///
/// Every primitive runs under one mutex, which gives the same single-record
/// atomicity a document store provides. Only tasks sharing this instance
/// coordinate through it; use it for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    records: Mutex<HashMap<String, LockRecord>>,
    index_ensured: AtomicBool,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record` as is, replacing any record with the same key.
    pub fn put(&self, record: LockRecord) {
        self.records()
            .insert(record.resource_key.clone(), record);
    }

    /// Returns a copy of the record for `resource_key`.
    pub fn get(&self, resource_key: &str) -> Option<LockRecord> {
        self.records().get(resource_key).cloned()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// Whether [`LockStore::ensure_unique_index`] has been called.
    pub fn unique_index_ensured(&self) -> bool {
        self.index_ensured.load(Ordering::Acquire)
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, LockRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LockStore for MemoryLockStore {
    async fn insert_if_absent(&self, record: NewLockRecord) -> LockResult<InsertOutcome> {
        let mut records = self.records();
        if records.contains_key(&record.resource_key) {
            return Ok(InsertOutcome::AlreadyExists);
        }

        let inserted = record.into_record(RecordId::new(Uuid::new_v4().to_string()));
        records.insert(inserted.resource_key.clone(), inserted.clone());
        Ok(InsertOutcome::Inserted(inserted))
    }

    async fn conditional_update(
        &self,
        filter: RecordMatch,
        update: RecordUpdate,
    ) -> LockResult<Option<LockRecord>> {
        let mut records = self.records();
        let Some(record) = records.values_mut().find(|record| filter.matches(record)) else {
            return Ok(None);
        };

        update.apply(record);
        Ok(Some(record.clone()))
    }

    async fn find_one(&self, resource_key: &str) -> LockResult<Option<LockRecord>> {
        Ok(self.get(resource_key))
    }

    async fn ensure_unique_index(&self) -> LockResult<()> {
        self.index_ensured.store(true, Ordering::Release);
        Ok(())
    }
}

//! Test doubles for exercising the lock manager.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use lease_lock_core::error::{LockError, LockResult};
use lease_lock_core::record::{LockRecord, NewLockRecord};
use lease_lock_core::store::{InsertOutcome, LockStore, RecordMatch, RecordUpdate};
use lease_lock_core::{Clock, MemoryLockStore};
use tokio::sync::Barrier;

/// A clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += TimeDelta::from_std(by).unwrap();
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Holds every lookup until `parties` callers have read, so they all act on
/// the same snapshot before anyone writes.
pub struct LockstepStore {
    pub inner: MemoryLockStore,
    barrier: Barrier,
}

impl LockstepStore {
    pub fn new(parties: usize) -> Self {
        Self {
            inner: MemoryLockStore::new(),
            barrier: Barrier::new(parties),
        }
    }
}

impl LockStore for LockstepStore {
    async fn insert_if_absent(&self, record: NewLockRecord) -> LockResult<InsertOutcome> {
        self.inner.insert_if_absent(record).await
    }

    async fn conditional_update(
        &self,
        filter: RecordMatch,
        update: RecordUpdate,
    ) -> LockResult<Option<LockRecord>> {
        self.inner.conditional_update(filter, update).await
    }

    async fn find_one(&self, resource_key: &str) -> LockResult<Option<LockRecord>> {
        let found = self.inner.find_one(resource_key).await;
        self.barrier.wait().await;
        found
    }

    async fn ensure_unique_index(&self) -> LockResult<()> {
        self.inner.ensure_unique_index().await
    }
}

/// A store that can be switched into failing every call, counting calls.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryLockStore,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> LockResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(LockError::Connection(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "store unavailable",
            ))));
        }
        Ok(())
    }
}

impl LockStore for FlakyStore {
    async fn insert_if_absent(&self, record: NewLockRecord) -> LockResult<InsertOutcome> {
        self.check()?;
        self.inner.insert_if_absent(record).await
    }

    async fn conditional_update(
        &self,
        filter: RecordMatch,
        update: RecordUpdate,
    ) -> LockResult<Option<LockRecord>> {
        self.check()?;
        self.inner.conditional_update(filter, update).await
    }

    async fn find_one(&self, resource_key: &str) -> LockResult<Option<LockRecord>> {
        self.check()?;
        self.inner.find_one(resource_key).await
    }

    async fn ensure_unique_index(&self) -> LockResult<()> {
        self.check()?;
        self.inner.ensure_unique_index().await
    }
}

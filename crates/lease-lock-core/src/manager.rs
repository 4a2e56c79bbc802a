//! The lock manager: lease acquisition, release and guarded execution.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::FutureExt;
use tracing::{debug, error, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::LockResult;
use crate::guarded::Guarded;
use crate::record::{LockRecord, NewLockRecord, RecordId};
use crate::spec::LockSpec;
use crate::store::{InsertOutcome, LockStore, RecordMatch, RecordUpdate};

/// Lease length applied to records that carry no lease of their own.
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(15);

/// Tunables of a [`LockManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockManagerOptions {
    pub default_lease_duration: Duration,
}

impl Default for LockManagerOptions {
    fn default() -> Self {
        Self {
            default_lease_duration: DEFAULT_LEASE_DURATION,
        }
    }
}

/// Builder for [`LockManager`].
pub struct LockManagerBuilder<S> {
    store: S,
    options: LockManagerOptions,
    clock: Arc<dyn Clock>,
}

impl<S: LockStore> LockManagerBuilder<S> {
    /// Creates a builder over `store` with default options and the system clock.
    pub fn new(store: S) -> Self {
        Self {
            store,
            options: LockManagerOptions::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the lease applied to records that carry none of their own.
    pub fn default_lease_duration(mut self, lease: Duration) -> Self {
        self.options.default_lease_duration = lease;
        self
    }

    /// Replaces all options at once.
    pub fn options(mut self, options: LockManagerOptions) -> Self {
        self.options = options;
        self
    }

    /// Uses `clock` instead of the system clock.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn build(self) -> LockManager<S> {
        LockManager {
            store: Arc::new(self.store),
            options: self.options,
            clock: self.clock,
        }
    }
}

/// Coordinates leases on named resources through a [`LockStore`].
///
/// The manager keeps no lock state of its own. Each call is a single attempt
/// against the store, and every decision that gates mutual exclusion is made
/// by the store's atomic conditional update. Any number of managers, in one
/// process or many, may share a store.
///
/// # Example
///
/// ```rust
/// use lease_lock_core::{LockManager, LockSpec, MemoryLockStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), lease_lock_core::LockError> {
/// let manager = LockManager::new(MemoryLockStore::new());
/// let spec = LockSpec::of(["reports", "daily"])?;
///
/// if let Some(lease) = manager.acquire(&spec).await {
///     // exclusive section
///     manager.release(&lease).await;
/// }
///
/// let total = manager
///     .get_guarded(&spec, || async { Ok::<_, std::io::Error>(40 + 2) })
///     .await;
/// assert_eq!(total, Some(42));
/// # Ok(())
/// # }
/// ```
pub struct LockManager<S> {
    store: Arc<S>,
    options: LockManagerOptions,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for LockManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            options: self.options.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: LockStore> LockManager<S> {
    /// Creates a manager with default options and the system clock.
    pub fn new(store: S) -> Self {
        Self::builder(store).build()
    }

    pub fn builder(store: S) -> LockManagerBuilder<S> {
        LockManagerBuilder::new(store)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn default_lease_duration(&self) -> Duration {
        self.options.default_lease_duration
    }

    // ------------------------------------------------------------------------
    // Acquisition
    // ------------------------------------------------------------------------

    /// Tries once to acquire the lock described by `spec`.
    ///
    /// Returns the held record, or `None` when the lock is held by someone
    /// else, a concurrent caller won the race, or the store failed. Store
    /// failures are logged; use [`try_acquire`](Self::try_acquire) to see
    /// them.
    pub async fn acquire(&self, spec: &LockSpec) -> Option<LockRecord> {
        match self.try_acquire(spec).await {
            Ok(acquired) => acquired,
            Err(e) => {
                error!(lock.key = %spec.resource_key(), error = %e, "lock acquisition failed");
                None
            }
        }
    }

    /// Tries once to acquire the lock described by `spec`, surfacing store
    /// failures.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(record))` - Lock acquired; `record` carries the token to
    ///   release it with
    /// * `Ok(None)` - Lock held by another caller, or a concurrent caller won
    /// * `Err(...)` - The store failed
    #[instrument(skip(self, spec), fields(lock.key = %spec.resource_key()))]
    pub async fn try_acquire(&self, spec: &LockSpec) -> LockResult<Option<LockRecord>> {
        match self.store.find_one(spec.resource_key()).await? {
            Some(existing) => self.acquire_existing(spec, existing).await,
            None => {
                debug!("lock not found");
                self.create_new(spec).await
            }
        }
    }

    async fn create_new(&self, spec: &LockSpec) -> LockResult<Option<LockRecord>> {
        self.store.ensure_unique_index().await?;

        let now = self.clock.now();
        match self.store.insert_if_absent(NewLockRecord::held(spec, now)).await? {
            InsertOutcome::Inserted(record) => {
                debug!(record.id = %record.id, "new lock created and acquired");
                Ok(Some(record))
            }
            InsertOutcome::AlreadyExists => {
                warn!("lost the race to create the lock");
                Ok(None)
            }
        }
    }

    async fn acquire_existing(
        &self,
        spec: &LockSpec,
        existing: LockRecord,
    ) -> LockResult<Option<LockRecord>> {
        let now = self.clock.now();
        let lease = existing.effective_lease_duration(self.options.default_lease_duration);

        if existing.is_free() {
            debug!(record.id = %existing.id, "found released lock");
        } else if existing.is_expired(now, self.options.default_lease_duration) {
            debug!(record.id = %existing.id, lease = ?lease, "found expired lock");
        } else {
            debug!(record.id = %existing.id, lease = ?lease, "found non expired lock");
        }

        let filter = RecordMatch::acquirable(&existing, lease_cutoff(now, lease));
        let update = RecordUpdate::Acquire {
            at: now,
            lease_duration: spec.lease_duration(),
            description: spec.description().map(str::to_string),
        };

        let acquired = self.store.conditional_update(filter, update).await?;
        match &acquired {
            Some(record) => debug!(record.id = %record.id, "existing lock acquired"),
            None => debug!("wasn't able to acquire existing lock"),
        }
        Ok(acquired)
    }

    // ------------------------------------------------------------------------
    // Release
    // ------------------------------------------------------------------------

    /// Releases a lease obtained from [`acquire`](Self::acquire).
    ///
    /// The release only applies while the record still carries the token
    /// observed at acquisition. If the lease expired and another caller took
    /// the lock over, this is a no-op that returns `None` and leaves the new
    /// holder's lock in place. Store failures are logged and yield `None`.
    pub async fn release(&self, acquired: &LockRecord) -> Option<LockRecord> {
        match self.try_release(acquired).await {
            Ok(released) => released,
            Err(e) => {
                error!(record.id = %acquired.id, error = %e, "lock release failed");
                None
            }
        }
    }

    /// Token-guarded release that surfaces store failures.
    #[instrument(skip(self, acquired), fields(lock.key = %acquired.resource_key, record.id = %acquired.id))]
    pub async fn try_release(&self, acquired: &LockRecord) -> LockResult<Option<LockRecord>> {
        let update = RecordUpdate::Release {
            at: self.clock.now(),
        };
        let released = self
            .store
            .conditional_update(RecordMatch::still_held(acquired), update)
            .await?;

        match &released {
            Some(_) => debug!("lock released"),
            None => warn!("lock was already released or taken over by another holder"),
        }
        Ok(released)
    }

    /// Releases the record with `id` whoever holds it.
    ///
    /// Meant for operators clearing a stuck lock. Unlike
    /// [`release`](Self::release) it does not check that the caller still
    /// owns the lease, so it can clear a lock that was taken over in the
    /// meantime. Returns the record after release, or `None` if the id does
    /// not resolve or the store failed.
    #[instrument(skip(self), fields(record.id = %id))]
    pub async fn force_release(&self, id: &RecordId) -> Option<LockRecord> {
        let update = RecordUpdate::Release {
            at: self.clock.now(),
        };
        match self
            .store
            .conditional_update(RecordMatch::by_id(id.clone()), update)
            .await
        {
            Ok(Some(record)) => {
                debug!(lock.key = %record.resource_key, "lock force released");
                Some(record)
            }
            Ok(None) => {
                debug!("lock not found");
                None
            }
            Err(e) => {
                error!(error = %e, "lock force release failed");
                None
            }
        }
    }

    /// Reads the current record for `spec` without touching it.
    pub async fn find(&self, spec: &LockSpec) -> LockResult<Option<LockRecord>> {
        self.store.find_one(spec.resource_key()).await
    }

    // ------------------------------------------------------------------------
    // Guarded execution
    // ------------------------------------------------------------------------

    /// Acquires the lock, runs `work`, and releases the lock on every exit.
    ///
    /// `work` is not invoked when the lock cannot be acquired. Errors and
    /// panics raised by `work` are logged and reported as
    /// [`Guarded::Failed`]; they never propagate to the caller. The release
    /// is token-guarded, as in [`release`](Self::release).
    #[instrument(skip_all, fields(lock.key = %spec.resource_key()))]
    pub async fn execute_guarded<F, Fut, T, E>(&self, spec: &LockSpec, work: F) -> Guarded<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let Some(acquired) = self.acquire(spec).await else {
            debug!("lock not acquired, skipping execution");
            return Guarded::NotAcquired;
        };

        let outcome = AssertUnwindSafe(async move { work().await })
            .catch_unwind()
            .await;

        self.release(&acquired).await;

        match outcome {
            Ok(Ok(value)) => {
                debug!("execution completed");
                Guarded::Completed(value)
            }
            Ok(Err(e)) => {
                error!(error = %e, "execution error");
                Guarded::Failed(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "execution panicked");
                Guarded::Failed(message)
            }
        }
    }

    /// Runs `work` under the lock and returns its value.
    ///
    /// `None` covers both "not acquired" and "work failed"; use
    /// [`execute_guarded`](Self::execute_guarded) to tell them apart.
    pub async fn get_guarded<F, Fut, T, E>(&self, spec: &LockSpec, work: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_guarded(spec, work).await.into_value()
    }

    /// Runs `work` under the lock.
    ///
    /// Returns `None` if the lock was not acquired, `Some(true)` if `work`
    /// completed and `Some(false)` if it failed.
    pub async fn run_guarded<F, Fut, E>(&self, spec: &LockSpec, work: F) -> Option<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        self.execute_guarded(spec, work).await.ran_successfully()
    }
}

/// Held records last modified before the returned instant are expired.
/// `None` when the lease is too long for any record to have expired.
fn lease_cutoff(now: DateTime<Utc>, lease: Duration) -> Option<DateTime<Utc>> {
    let lease = TimeDelta::from_std(lease).ok()?;
    now.checked_sub_signed(lease)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "work panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::memory::MemoryLockStore;
    use crate::record::LockState;

    #[derive(Clone)]
    struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

    impl ManualClock {
        fn new() -> Self {
            Self(Arc::new(Mutex::new(Utc::now())))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += TimeDelta::from_std(by).unwrap();
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn manager() -> (LockManager<MemoryLockStore>, ManualClock) {
        let clock = ManualClock::new();
        let manager = LockManager::builder(MemoryLockStore::new())
            .default_lease_duration(Duration::from_secs(10))
            .clock(clock.clone())
            .build();
        (manager, clock)
    }

    fn spec(key: &str) -> LockSpec {
        LockSpec::of([key]).unwrap()
    }

    #[tokio::test]
    async fn test_first_acquire_creates_held_record() {
        let (manager, _clock) = manager();
        let record = manager.acquire(&spec("orders")).await.unwrap();

        assert_eq!(record.resource_key, "orders");
        assert_eq!(record.state, LockState::Held);
        assert_eq!(record.acquired_at, record.last_modified_at);
        assert!(manager.store().unique_index_ensured());
    }

    #[tokio::test]
    async fn test_held_lock_is_not_acquirable_within_lease() {
        let (manager, clock) = manager();
        manager.acquire(&spec("orders")).await.unwrap();

        assert!(manager.acquire(&spec("orders")).await.is_none());
        clock.advance(Duration::from_secs(10));
        assert!(
            manager.acquire(&spec("orders")).await.is_none(),
            "lease boundary is still covered"
        );
    }

    #[tokio::test]
    async fn test_expired_lock_is_recovered() {
        let (manager, clock) = manager();
        let first = manager.acquire(&spec("orders")).await.unwrap();

        clock.advance(Duration::from_secs(11));
        let second = manager.acquire(&spec("orders")).await.unwrap();

        assert_eq!(second.id, first.id);
        assert!(second.concurrency_token > first.concurrency_token);
        assert!(second.acquired_at > first.acquired_at);
    }

    #[tokio::test]
    async fn test_spec_lease_overrides_default() {
        let (manager, clock) = manager();
        let short = LockSpec::builder()
            .token("orders")
            .lease_duration(Duration::from_secs(1))
            .description("short job")
            .build()
            .unwrap();
        let record = manager.acquire(&short).await.unwrap();
        assert_eq!(record.lease_duration, Some(Duration::from_secs(1)));
        assert_eq!(record.description.as_deref(), Some("short job"));

        clock.advance(Duration::from_secs(2));
        let taken = manager.acquire(&spec("orders")).await.unwrap();
        assert_eq!(taken.lease_duration, None);
        assert_eq!(taken.description, None);
    }

    #[tokio::test]
    async fn test_release_then_acquire() {
        let (manager, clock) = manager();
        let first = manager.acquire(&spec("orders")).await.unwrap();

        clock.advance(Duration::from_millis(5));
        let released = manager.release(&first).await.unwrap();
        assert_eq!(released.state, LockState::Free);
        assert_eq!(released.acquired_at, first.acquired_at);
        assert!(released.last_modified_at > first.last_modified_at);

        clock.advance(Duration::from_millis(5));
        let second = manager.acquire(&spec("orders")).await.unwrap();
        assert_eq!(second.resource_key, first.resource_key);
        assert!(second.acquired_at > first.acquired_at);
        assert!(second.last_modified_at > released.last_modified_at);
    }

    #[tokio::test]
    async fn test_stale_release_does_not_clear_new_holder() {
        let (manager, clock) = manager();
        let stale = manager.acquire(&spec("orders")).await.unwrap();

        clock.advance(Duration::from_secs(11));
        let current = manager.acquire(&spec("orders")).await.unwrap();

        assert!(manager.release(&stale).await.is_none());
        let record = manager.find(&spec("orders")).await.unwrap().unwrap();
        assert_eq!(record.state, LockState::Held);
        assert_eq!(record.concurrency_token, current.concurrency_token);

        let forced = manager.force_release(&stale.id).await.unwrap();
        assert_eq!(forced.state, LockState::Free);
    }

    #[tokio::test]
    async fn test_force_release_unknown_id() {
        let (manager, _clock) = manager();
        assert!(manager.force_release(&RecordId::new("missing")).await.is_none());
    }

    #[tokio::test]
    async fn test_guarded_work_skipped_when_not_acquired() {
        let (manager, _clock) = manager();
        manager.acquire(&spec("orders")).await.unwrap();

        let invoked = AtomicBool::new(false);
        let result = manager
            .run_guarded(&spec("orders"), || async {
                invoked.store(true, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await;

        assert_eq!(result, None);
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_guarded_work_failure_releases_lock() {
        let (manager, _clock) = manager();

        let result = manager
            .run_guarded(&spec("orders"), || async { Err::<(), _>("boom") })
            .await;
        assert_eq!(result, Some(false));
        assert!(manager.acquire(&spec("orders")).await.is_some());
    }

    #[tokio::test]
    async fn test_guarded_panic_releases_lock() {
        let (manager, _clock) = manager();

        let outcome = manager
            .execute_guarded(&spec("orders"), || async {
                if true {
                    panic!("worker crashed");
                }
                Ok::<u32, String>(1)
            })
            .await;
        assert_eq!(outcome, Guarded::Failed("worker crashed".to_string()));
        assert!(manager.acquire(&spec("orders")).await.is_some());
    }

    #[tokio::test]
    async fn test_get_guarded_returns_value_and_releases() {
        let (manager, _clock) = manager();

        let value = manager
            .get_guarded(&spec("orders"), || async { Ok::<_, String>("synced") })
            .await;
        assert_eq!(value, Some("synced"));

        let record = manager.find(&spec("orders")).await.unwrap().unwrap();
        assert_eq!(record.state, LockState::Free);
    }
}

//! The storage capability the lock manager is built on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::LockResult;
use crate::record::{ConcurrencyToken, LockRecord, LockState, NewLockRecord, RecordId};

// ============================================================================
// Predicates and mutations
// ============================================================================

/// Which lock states a [`RecordMatch`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMatch {
    /// Any state.
    Any,
    /// Only free records.
    Free,
    /// Only held records.
    Held,
    /// Free records, or held records last modified strictly before
    /// `expired_before`.
    FreeOrExpired { expired_before: DateTime<Utc> },
}

impl StateMatch {
    pub fn matches(&self, record: &LockRecord) -> bool {
        match self {
            Self::Any => true,
            Self::Free => record.state == LockState::Free,
            Self::Held => record.state == LockState::Held,
            Self::FreeOrExpired { expired_before } => match record.state {
                LockState::Free => true,
                LockState::Held => record.last_modified_at < *expired_before,
            },
        }
    }
}

/// Predicate of a conditional update.
///
/// Every populated field must match for the update to apply. Stores translate
/// this into their own query language (a filter document, a `WHERE` clause,
/// a compare-and-swap on a key); in-process stores can call
/// [`RecordMatch::matches`] directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMatch {
    pub id: RecordId,
    pub resource_key: Option<String>,
    pub token: Option<ConcurrencyToken>,
    pub state: StateMatch,
}

impl RecordMatch {
    /// Matches the record with `id` whatever its state.
    pub fn by_id(id: RecordId) -> Self {
        Self {
            id,
            resource_key: None,
            token: None,
            state: StateMatch::Any,
        }
    }

    /// Matches `snapshot` if nobody touched it since it was read and it is
    /// either free or held with a lease that ran out before
    /// `expired_before`. Without a cutoff only a free record matches.
    pub fn acquirable(snapshot: &LockRecord, expired_before: Option<DateTime<Utc>>) -> Self {
        Self {
            id: snapshot.id.clone(),
            resource_key: Some(snapshot.resource_key.clone()),
            token: Some(snapshot.concurrency_token),
            state: match expired_before {
                Some(expired_before) => StateMatch::FreeOrExpired { expired_before },
                None => StateMatch::Free,
            },
        }
    }

    /// Matches `acquired` only while it is still held under the same token,
    /// i.e. nobody took it over since it was acquired.
    pub fn still_held(acquired: &LockRecord) -> Self {
        Self {
            id: acquired.id.clone(),
            resource_key: Some(acquired.resource_key.clone()),
            token: Some(acquired.concurrency_token),
            state: StateMatch::Held,
        }
    }

    pub fn matches(&self, record: &LockRecord) -> bool {
        record.id == self.id
            && self
                .resource_key
                .as_ref()
                .is_none_or(|key| *key == record.resource_key)
            && self
                .token
                .is_none_or(|token| token == record.concurrency_token)
            && self.state.matches(record)
    }
}

/// Mutation of a conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordUpdate {
    /// Marks the record held from `at` under new lease terms.
    Acquire {
        at: DateTime<Utc>,
        lease_duration: Option<Duration>,
        description: Option<String>,
    },
    /// Marks the record free as of `at`.
    Release { at: DateTime<Utc> },
}

impl RecordUpdate {
    /// The timestamp written to `last_modified_at`.
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Acquire { at, .. } | Self::Release { at } => *at,
        }
    }

    /// Applies the mutation the way a store does, bumping the token.
    pub fn apply(&self, record: &mut LockRecord) {
        match self {
            Self::Acquire {
                at,
                lease_duration,
                description,
            } => {
                record.state = LockState::Held;
                record.acquired_at = *at;
                record.last_modified_at = *at;
                record.lease_duration = *lease_duration;
                record.description = description.clone();
            }
            Self::Release { at } => {
                record.state = LockState::Free;
                record.last_modified_at = *at;
            }
        }
        record.concurrency_token = record.concurrency_token.next();
    }
}

/// Result of [`LockStore::insert_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was created.
    Inserted(LockRecord),
    /// A record with the same resource key already exists.
    AlreadyExists,
}

// ============================================================================
// Store trait
// ============================================================================

/// Atomic single-record primitives backing the lock manager.
///
/// Every method must be atomic in the store itself: the manager never
/// combines a read and a write into a critical section of its own.
///
/// Implementations exist for MongoDB (`lease-lock-mongo`) and for a single
/// process ([`MemoryLockStore`](crate::memory::MemoryLockStore)).
pub trait LockStore: Send + Sync {
    /// Inserts `record` unless a record with the same resource key exists.
    ///
    /// Concurrent inserts for one key must leave exactly one winner; the
    /// losers observe [`InsertOutcome::AlreadyExists`].
    fn insert_if_absent(
        &self,
        record: NewLockRecord,
    ) -> impl Future<Output = LockResult<InsertOutcome>> + Send;

    /// Applies `update` to the record matching `filter`, if any.
    ///
    /// Affects zero or one record, increments its concurrency token and
    /// returns the record as it is after the update.
    fn conditional_update(
        &self,
        filter: RecordMatch,
        update: RecordUpdate,
    ) -> impl Future<Output = LockResult<Option<LockRecord>>> + Send;

    /// Looks up the record for `resource_key`.
    fn find_one(
        &self,
        resource_key: &str,
    ) -> impl Future<Output = LockResult<Option<LockRecord>>> + Send;

    /// Ensures resource keys are unique. Must be idempotent.
    fn ensure_unique_index(&self) -> impl Future<Output = LockResult<()>> + Send;
}

impl<S: LockStore> LockStore for Arc<S> {
    fn insert_if_absent(
        &self,
        record: NewLockRecord,
    ) -> impl Future<Output = LockResult<InsertOutcome>> + Send {
        (**self).insert_if_absent(record)
    }

    fn conditional_update(
        &self,
        filter: RecordMatch,
        update: RecordUpdate,
    ) -> impl Future<Output = LockResult<Option<LockRecord>>> + Send {
        (**self).conditional_update(filter, update)
    }

    fn find_one(
        &self,
        resource_key: &str,
    ) -> impl Future<Output = LockResult<Option<LockRecord>>> + Send {
        (**self).find_one(resource_key)
    }

    fn ensure_unique_index(&self) -> impl Future<Output = LockResult<()>> + Send {
        (**self).ensure_unique_index()
    }
}

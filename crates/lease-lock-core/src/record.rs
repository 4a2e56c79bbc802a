//! The persisted lock record and its identifiers.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::spec::LockSpec;

/// Store-assigned identifier of a lock record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optimistic concurrency token.
///
/// Stores bump the token on every successful conditional update. The lock
/// manager never looks inside it; it only echoes the value it read back into
/// the next predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConcurrencyToken(u64);

impl ConcurrencyToken {
    /// Token carried by a freshly inserted record.
    pub const INITIAL: Self = Self(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// The token a store assigns after one more successful update.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// State of a lock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LockState {
    /// Nobody holds the lock.
    Free,
    /// The lock is held until released or until its lease runs out.
    Held,
}

impl LockState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Held => "HELD",
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lock record as stored.
///
/// Exactly one record exists per resource key. Records are created held,
/// flip between [`LockState::Held`] and [`LockState::Free`] afterwards and
/// are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    pub id: RecordId,
    pub resource_key: String,
    pub concurrency_token: ConcurrencyToken,
    pub state: LockState,
    pub acquired_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    /// Overrides the manager's default lease when set.
    pub lease_duration: Option<Duration>,
    pub description: Option<String>,
}

impl LockRecord {
    pub fn is_held(&self) -> bool {
        self.state == LockState::Held
    }

    pub fn is_free(&self) -> bool {
        self.state == LockState::Free
    }

    /// The record's own lease, or `default` when it has none.
    pub fn effective_lease_duration(&self, default: Duration) -> Duration {
        self.lease_duration.unwrap_or(default)
    }

    /// When a held record stops being protected by its lease.
    ///
    /// Returns `None` for free records and for leases too long to represent.
    pub fn expires_at(&self, default: Duration) -> Option<DateTime<Utc>> {
        if !self.is_held() {
            return None;
        }
        let lease = TimeDelta::from_std(self.effective_lease_duration(default)).ok()?;
        self.last_modified_at.checked_add_signed(lease)
    }

    /// Whether a held record's lease ran out before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, default: Duration) -> bool {
        self.expires_at(default).is_some_and(|expires_at| now > expires_at)
    }
}

/// A record about to be inserted; the store assigns its id and token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLockRecord {
    pub resource_key: String,
    pub state: LockState,
    pub acquired_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    pub lease_duration: Option<Duration>,
    pub description: Option<String>,
}

impl NewLockRecord {
    /// A record held from `now` on behalf of `spec`.
    pub fn held(spec: &LockSpec, now: DateTime<Utc>) -> Self {
        Self {
            resource_key: spec.resource_key().to_string(),
            state: LockState::Held,
            acquired_at: now,
            last_modified_at: now,
            lease_duration: spec.lease_duration(),
            description: spec.description().map(str::to_string),
        }
    }

    /// Completes the record with the identity assigned by the store.
    pub fn into_record(self, id: RecordId) -> LockRecord {
        LockRecord {
            id,
            resource_key: self.resource_key,
            concurrency_token: ConcurrencyToken::INITIAL,
            state: self.state,
            acquired_at: self.acquired_at,
            last_modified_at: self.last_modified_at,
            lease_duration: self.lease_duration,
            description: self.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held_at(last_modified_at: DateTime<Utc>, lease: Option<Duration>) -> LockRecord {
        LockRecord {
            id: RecordId::new("1"),
            resource_key: "key".to_string(),
            concurrency_token: ConcurrencyToken::INITIAL,
            state: LockState::Held,
            acquired_at: last_modified_at,
            last_modified_at,
            lease_duration: lease,
            description: None,
        }
    }

    #[test]
    fn test_expiry_uses_record_lease_before_default() {
        let start = Utc::now();
        let record = held_at(start, Some(Duration::from_secs(5)));
        let default = Duration::from_secs(60);

        assert!(!record.is_expired(start + TimeDelta::seconds(5), default));
        assert!(record.is_expired(start + TimeDelta::seconds(6), default));
    }

    #[test]
    fn test_expiry_falls_back_to_default() {
        let start = Utc::now();
        let record = held_at(start, None);
        let default = Duration::from_secs(15);

        assert_eq!(
            record.expires_at(default),
            Some(start + TimeDelta::seconds(15))
        );
        assert!(!record.is_expired(start + TimeDelta::seconds(10), default));
        assert!(record.is_expired(start + TimeDelta::seconds(16), default));
    }

    #[test]
    fn test_free_record_never_expires() {
        let start = Utc::now();
        let mut record = held_at(start, Some(Duration::ZERO));
        record.state = LockState::Free;

        assert_eq!(record.expires_at(Duration::ZERO), None);
        assert!(!record.is_expired(start + TimeDelta::days(1), Duration::ZERO));
    }

    #[test]
    fn test_unrepresentable_lease_never_expires() {
        let start = Utc::now();
        let record = held_at(start, Some(Duration::MAX));
        assert!(!record.is_expired(start + TimeDelta::days(365), Duration::ZERO));
    }

    #[test]
    fn test_token_next_is_monotonic() {
        let token = ConcurrencyToken::INITIAL;
        assert!(token.next() > token);
        assert_eq!(token.next().value(), 1);
    }

    #[test]
    fn test_state_serializes_uppercase() {
        assert_eq!(LockState::Held.as_str(), "HELD");
        assert_eq!(LockState::Free.to_string(), "FREE");
    }
}

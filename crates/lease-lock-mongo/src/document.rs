use std::time::Duration;

use lease_lock_core::error::{LockError, LockResult};
use lease_lock_core::record::{ConcurrencyToken, LockRecord, LockState, NewLockRecord, RecordId};
use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// A lock record as stored in MongoDB.
///
/// Timestamps are BSON dates, so they carry millisecond precision. The
/// concurrency token lives in `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoLockDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub resource_key: String,

    pub version: i64,

    pub state: LockState,

    pub acquired_at: DateTime,

    pub last_modified_at: DateTime,

    #[serde(default)]
    pub lease_duration_millis: Option<i64>,

    #[serde(default)]
    pub description: Option<String>,
}

impl MongoLockDocument {
    /// Converts the stored document into the core record type.
    pub fn into_record(self) -> LockResult<LockRecord> {
        let id = self
            .id
            .ok_or_else(|| invalid_document("lock document has no _id"))?;
        let version = u64::try_from(self.version)
            .map_err(|_| invalid_document("lock document has a negative version"))?;
        let lease_duration = self
            .lease_duration_millis
            .map(|millis| {
                u64::try_from(millis)
                    .map(Duration::from_millis)
                    .map_err(|_| invalid_document("lock document has a negative lease"))
            })
            .transpose()?;

        Ok(LockRecord {
            id: RecordId::new(id.to_hex()),
            resource_key: self.resource_key,
            concurrency_token: ConcurrencyToken::new(version),
            state: self.state,
            acquired_at: from_bson_date(self.acquired_at)?,
            last_modified_at: from_bson_date(self.last_modified_at)?,
            lease_duration,
            description: self.description,
        })
    }
}

impl From<NewLockRecord> for MongoLockDocument {
    fn from(record: NewLockRecord) -> Self {
        Self {
            id: None,
            resource_key: record.resource_key,
            version: token_to_bson(ConcurrencyToken::INITIAL),
            state: record.state,
            acquired_at: to_bson_date(record.acquired_at),
            last_modified_at: to_bson_date(record.last_modified_at),
            lease_duration_millis: record.lease_duration.map(duration_to_millis),
            description: record.description,
        }
    }
}

pub(crate) fn to_bson_date(at: chrono::DateTime<chrono::Utc>) -> DateTime {
    DateTime::from_millis(at.timestamp_millis())
}

pub(crate) fn from_bson_date(at: DateTime) -> LockResult<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp_millis(at.timestamp_millis())
        .ok_or_else(|| invalid_document("lock document has an out of range date"))
}

pub(crate) fn duration_to_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

pub(crate) fn token_to_bson(token: ConcurrencyToken) -> i64 {
    i64::try_from(token.value()).unwrap_or(i64::MAX)
}

fn invalid_document(message: &str) -> LockError {
    LockError::backend(message.to_string())
}

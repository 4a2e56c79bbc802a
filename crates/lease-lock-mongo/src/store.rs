use lease_lock_core::error::{LockError, LockResult};
use lease_lock_core::record::{LockRecord, LockState, NewLockRecord};
use lease_lock_core::store::{InsertOutcome, LockStore, RecordMatch, RecordUpdate, StateMatch};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc, oid::ObjectId},
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};
use tracing::{debug, instrument};

use crate::document::{MongoLockDocument, duration_to_millis, to_bson_date, token_to_bson};
use crate::options::MongoLockStoreOptions;

/// Server error code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Builder for [`MongoLockStore`].
#[derive(Default)]
pub struct MongoLockStoreBuilder {
    database: Option<Database>,
    connection_string: Option<String>,
    database_name: Option<String>,
    options: MongoLockStoreOptions,
}

impl MongoLockStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing database handle.
    pub fn database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    /// Connects with the given URI when no database handle was supplied.
    pub fn connection_string(mut self, uri: impl Into<String>) -> Self {
        self.connection_string = Some(uri.into());
        self
    }

    /// Database to use with [`connection_string`](Self::connection_string).
    ///
    /// Defaults to the database named in the URI.
    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.options.collection_name = name.into();
        self
    }

    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.options.index_name = name.into();
        self
    }

    /// Builds the store, connecting first if needed.
    pub async fn build(self) -> LockResult<MongoLockStore> {
        let database = match (self.database, self.connection_string) {
            (Some(database), _) => database,
            (None, Some(uri)) => {
                let client = Client::with_uri_str(&uri)
                    .await
                    .map_err(|e| LockError::Connection(Box::new(e)))?;
                match self.database_name {
                    Some(name) => client.database(&name),
                    None => client.default_database().ok_or_else(|| {
                        LockError::Configuration(
                            "database name not specified and connection string names none"
                                .to_string(),
                        )
                    })?,
                }
            }
            (None, None) => {
                return Err(LockError::Configuration(
                    "database or connection string not specified".to_string(),
                ));
            }
        };

        Ok(MongoLockStore::with_options(database, self.options))
    }
}

/// Lock records kept in a MongoDB collection.
///
/// Conditional updates run as a single `findOneAndUpdate`, and a unique index
/// on `resourceKey` settles concurrent creation of the same lock.
#[derive(Clone)]
pub struct MongoLockStore {
    collection: Collection<MongoLockDocument>,
    options: MongoLockStoreOptions,
}

impl MongoLockStore {
    pub fn builder() -> MongoLockStoreBuilder {
        MongoLockStoreBuilder::new()
    }

    /// Creates a store over `database` with the default collection name.
    pub fn new(database: Database) -> Self {
        Self::with_options(database, MongoLockStoreOptions::default())
    }

    pub fn with_options(database: Database, options: MongoLockStoreOptions) -> Self {
        let collection = database.collection(&options.collection_name);
        Self {
            collection,
            options,
        }
    }

    pub fn collection(&self) -> &Collection<MongoLockDocument> {
        &self.collection
    }

    pub fn options(&self) -> &MongoLockStoreOptions {
        &self.options
    }
}

impl LockStore for MongoLockStore {
    #[instrument(skip_all, fields(lock.key = %record.resource_key, backend = "mongo"))]
    async fn insert_if_absent(&self, record: NewLockRecord) -> LockResult<InsertOutcome> {
        let mut document = MongoLockDocument::from(record);
        match self.collection.insert_one(&document).await {
            Ok(result) => {
                document.id = result.inserted_id.as_object_id();
                Ok(InsertOutcome::Inserted(document.into_record()?))
            }
            Err(e) if is_duplicate_key(&e) => {
                debug!("lock document already exists");
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(e) => Err(driver_error(e)),
        }
    }

    #[instrument(skip_all, fields(record.id = %filter.id, backend = "mongo"))]
    async fn conditional_update(
        &self,
        filter: RecordMatch,
        update: RecordUpdate,
    ) -> LockResult<Option<LockRecord>> {
        let Some(filter) = filter_document(&filter) else {
            debug!("record id is not an ObjectId, nothing to update");
            return Ok(None);
        };

        self.collection
            .find_one_and_update(filter, update_document(&update))
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    LockError::Conflict(e.to_string())
                } else {
                    driver_error(e)
                }
            })?
            .map(MongoLockDocument::into_record)
            .transpose()
    }

    async fn find_one(&self, resource_key: &str) -> LockResult<Option<LockRecord>> {
        self.collection
            .find_one(doc! { "resourceKey": resource_key })
            .await
            .map_err(driver_error)?
            .map(MongoLockDocument::into_record)
            .transpose()
    }

    async fn ensure_unique_index(&self) -> LockResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "resourceKey": 1 })
            .options(
                IndexOptions::builder()
                    .name(self.options.index_name.clone())
                    .unique(true)
                    .build(),
            )
            .build();

        let created = self
            .collection
            .create_index(index)
            .await
            .map_err(driver_error)?;
        debug!(index = %created.index_name, "ensured index exists");
        Ok(())
    }
}

/// Translates a core predicate into a MongoDB filter.
///
/// Returns `None` when the record id cannot name any stored document.
pub(crate) fn filter_document(filter: &RecordMatch) -> Option<Document> {
    let id = ObjectId::parse_str(filter.id.as_str()).ok()?;
    let mut document = doc! { "_id": id };

    if let Some(resource_key) = &filter.resource_key {
        document.insert("resourceKey", resource_key.as_str());
    }
    if let Some(token) = filter.token {
        document.insert("version", token_to_bson(token));
    }
    match filter.state {
        StateMatch::Any => {}
        StateMatch::Free => {
            document.insert("state", LockState::Free.as_str());
        }
        StateMatch::Held => {
            document.insert("state", LockState::Held.as_str());
        }
        StateMatch::FreeOrExpired { expired_before } => {
            document.insert(
                "$or",
                vec![
                    doc! { "state": LockState::Free.as_str() },
                    doc! {
                        "state": LockState::Held.as_str(),
                        "lastModifiedAt": { "$lt": to_bson_date(expired_before) },
                    },
                ],
            );
        }
    }

    Some(document)
}

/// Translates a core mutation into a MongoDB update that also bumps the
/// concurrency token.
pub(crate) fn update_document(update: &RecordUpdate) -> Document {
    let set = match update {
        RecordUpdate::Acquire {
            at,
            lease_duration,
            description,
        } => doc! {
            "state": LockState::Held.as_str(),
            "acquiredAt": to_bson_date(*at),
            "lastModifiedAt": to_bson_date(*at),
            "leaseDurationMillis": lease_duration.map(duration_to_millis),
            "description": description.clone(),
        },
        RecordUpdate::Release { at } => doc! {
            "state": LockState::Free.as_str(),
            "lastModifiedAt": to_bson_date(*at),
        },
    };

    doc! {
        "$set": set,
        "$inc": { "version": 1_i64 },
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

fn driver_error(error: mongodb::error::Error) -> LockError {
    match error.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Io(_)
        | ErrorKind::ConnectionPoolCleared { .. } => LockError::Connection(Box::new(error)),
        _ => LockError::Backend(Box::new(error)),
    }
}

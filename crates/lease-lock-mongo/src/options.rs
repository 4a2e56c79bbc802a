/// Collection used when none is configured.
pub const DEFAULT_COLLECTION_NAME: &str = "lock";

/// Name of the unique index on the resource key.
pub const DEFAULT_INDEX_NAME: &str = "Lock_resourceKey";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoLockStoreOptions {
    pub collection_name: String,
    pub index_name: String,
}

impl Default for MongoLockStoreOptions {
    fn default() -> Self {
        Self {
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
        }
    }
}

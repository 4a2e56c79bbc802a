//! MongoDB backend for lease locks.
//!
//! Lock records live in one collection (`lock` by default) with a unique
//! index on `resourceKey`. Every conditional update is a single
//! `findOneAndUpdate`, which MongoDB applies atomically per document.
//!
//! ```rust,no_run
//! use lease_lock_core::{LockManager, LockSpec};
//! use lease_lock_mongo::MongoLockStore;
//!
//! # async fn example() -> Result<(), lease_lock_core::LockError> {
//! let store = MongoLockStore::builder()
//!     .connection_string("mongodb://localhost:27017")
//!     .database_name("app")
//!     .build()
//!     .await?;
//! let manager = LockManager::new(store);
//!
//! let synced = manager
//!     .run_guarded(&LockSpec::of(["master-leader-sync"])?, || async {
//!         Ok::<_, std::io::Error>(())
//!     })
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod options;
pub mod store;

pub use document::MongoLockDocument;
pub use options::MongoLockStoreOptions;
pub use store::{MongoLockStore, MongoLockStoreBuilder};

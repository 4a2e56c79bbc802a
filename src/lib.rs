//! Lease-based distributed locks over a shared document store.
//!
//! Independent processes serialize work on a named resource through one
//! record per resource in a store they all reach. No coordination service is
//! involved: a lock is taken with a compare-and-set on the record, and a lock
//! whose holder stopped renewing it can be taken over once its lease runs out.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lease_lock::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoLockStore::builder()
//!         .connection_string("mongodb://localhost:27017")
//!         .database_name("app")
//!         .build()
//!         .await?;
//!     let manager = LockManager::builder(store)
//!         .default_lease_duration(Duration::from_secs(30))
//!         .build();
//!
//!     let spec = LockSpec::builder()
//!         .token("invoice")
//!         .token(42)
//!         .description("settlement")
//!         .build()?;
//!
//!     // Acquire and release by hand...
//!     if let Some(lease) = manager.acquire(&spec).await {
//!         println!("Doing critical work...");
//!         manager.release(&lease).await;
//!     }
//!
//!     // ...or let the manager release on every exit path.
//!     let outcome = manager
//!         .execute_guarded(&spec, || async { Ok::<_, std::io::Error>("done") })
//!         .await;
//!     match outcome {
//!         Guarded::NotAcquired => println!("someone else holds the lock"),
//!         Guarded::Completed(result) => println!("finished: {result}"),
//!         Guarded::Failed(error) => println!("work failed: {error}"),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`MongoLockStore`]: a MongoDB collection with a unique index on the
//!   resource key.
//! - [`MemoryLockStore`]: a single-process store for tests and local use.
//!
//! Other stores plug in by implementing [`LockStore`].
//!
//! # Crate Organization
//!
//! This is a meta-crate that re-exports types from:
//! - `lease-lock-core`: protocol, record model and lock manager
//! - `lease-lock-mongo`: MongoDB backend

// Re-export core types and traits
pub use lease_lock_core::*;

// Re-export mongo backend
#[allow(ambiguous_glob_reexports)]
pub use lease_lock_mongo::*;

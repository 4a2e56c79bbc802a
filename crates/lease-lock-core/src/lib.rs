//! Core types for lease-based distributed locks.
//!
//! A lock is a record in a shared store, one per resource key. Acquiring
//! the lock flips the record to held with a compare-and-set on its
//! concurrency token; a held record whose lease has run out can be taken
//! over by the next caller without an explicit release.

pub mod clock;
pub mod error;
pub mod guarded;
pub mod manager;
pub mod memory;
pub mod prelude;
pub mod record;
pub mod spec;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use error::{LockError, LockResult};
pub use guarded::Guarded;
pub use manager::{DEFAULT_LEASE_DURATION, LockManager, LockManagerBuilder, LockManagerOptions};
pub use memory::MemoryLockStore;
pub use record::{ConcurrencyToken, LockRecord, LockState, NewLockRecord, RecordId};
pub use spec::{KEY_SEPARATOR, LockSpec, LockSpecBuilder};
pub use store::{InsertOutcome, LockStore, RecordMatch, RecordUpdate, StateMatch};

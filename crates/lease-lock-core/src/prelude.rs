//! Convenience prelude for lease lock types.

pub use crate::error::{LockError, LockResult};
pub use crate::guarded::Guarded;
pub use crate::manager::LockManager;
pub use crate::record::{LockRecord, LockState, RecordId};
pub use crate::spec::LockSpec;
pub use crate::store::LockStore;

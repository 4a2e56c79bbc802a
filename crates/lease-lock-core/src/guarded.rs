//! Outcome of running work under a lock.

/// What happened to a unit of work submitted through
/// [`LockManager::execute_guarded`](crate::manager::LockManager::execute_guarded).
///
/// `get_guarded` and `run_guarded` collapse this into `Option<T>` and
/// `Option<bool>`; match on it directly to tell a busy lock from failed work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guarded<T> {
    /// The lock could not be acquired; the work never ran.
    NotAcquired,
    /// The work ran to completion.
    Completed(T),
    /// The work returned an error or panicked. Holds the rendered failure.
    Failed(String),
}

impl<T> Guarded<T> {
    /// Whether the lock was acquired, regardless of how the work ended.
    pub fn was_acquired(&self) -> bool {
        !matches!(self, Self::NotAcquired)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The work's result, if it completed.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::NotAcquired | Self::Failed(_) => None,
        }
    }

    /// `None` when the lock was not acquired, otherwise whether the work
    /// completed.
    pub fn ran_successfully(&self) -> Option<bool> {
        match self {
            Self::NotAcquired => None,
            Self::Completed(_) => Some(true),
            Self::Failed(_) => Some(false),
        }
    }

    /// The failure message, if the work failed.
    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            Self::NotAcquired | Self::Completed(_) => None,
        }
    }
}

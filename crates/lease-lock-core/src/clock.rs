//! Wall-clock source used for lease bookkeeping.

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// All expiry decisions compare timestamps produced by this clock with
/// timestamps written by other processes, so every participant is expected
/// to run on a reasonably synchronized wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

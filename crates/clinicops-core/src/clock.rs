//! Time source used to stamp event metadata.

use chrono::{DateTime, SubsecRound, Utc};

/// Supplies the creation instant written into every emitted event.
///
/// Injected into the event store so tests can pin timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source.
///
/// Truncated to microseconds, the precision of `TIMESTAMPTZ`, so a stored
/// event reads back equal to the record that was emitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}

// File: dealdrop-core/src/clock.rs

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

/// Time source injected into every component with temporal logic (claim
/// TTLs, drip release, the expiry reaper), so all of it can be driven
/// deterministically in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually-driven clock for tests: time only moves when told to.
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write() = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now = *now + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

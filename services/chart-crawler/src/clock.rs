//!
//! src/clock.rs  Andrew Belles  Oct 2nd, 2025
//!
//! Reference time zone for every timestamp the crawler writes or compares.
//! All times are carried as DateTime<FixedOffset> pinned to UTC+8 so that
//! naive/aware mixing cannot happen downstream.
//!

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Offset of the reference zone in seconds east of UTC
pub const REFERENCE_OFFSET_SECS: i32 = 8 * 3600;

pub type RefTime = DateTime<FixedOffset>;

pub fn reference_zone() -> FixedOffset {
    FixedOffset::east_opt(REFERENCE_OFFSET_SECS).expect("UTC+8 is a valid offset")
}

/// Attach the reference zone to a wall-clock value read back from storage
pub fn localize(naive: &NaiveDateTime) -> Option<RefTime> {
    reference_zone().from_local_datetime(naive).single()
}

pub trait Clock: Send + Sync {
    fn now(&self) -> RefTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> RefTime {
        Utc::now().with_timezone(&reference_zone())
    }
}

/// Pinned clock for tests
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub RefTime);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> RefTime { self.0 }
}

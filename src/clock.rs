// clock.rs

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between 1970-01-01 and 2000-01-01, for clocks counting from 2000.
pub const TIME_OFFSET: i64 = 946_684_800;

/// Wall-clock source for served timestamps.
pub trait Clock {
    /// Seconds since the platform clock epoch.
    fn now_secs(&self) -> i64;

    /// Seconds to add to `now_secs()` to get Unix time.
    fn epoch_offset(&self) -> i64;

    fn unix_secs(&self) -> i64 {
        self.now_secs() + self.epoch_offset()
    }
}

/// The system clock. Counts from the Unix epoch, so it needs no offset.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn epoch_offset(&self) -> i64 {
        0
    }
}

/// A clock frozen at a given platform time.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock {
    pub secs: i64,
    pub offset: i64,
}

impl FixedClock {
    pub fn new(secs: i64, offset: i64) -> Self {
        Self { secs, offset }
    }
}

impl Clock for FixedClock {
    fn now_secs(&self) -> i64 {
        self.secs
    }

    fn epoch_offset(&self) -> i64 {
        self.offset
    }
}


// EOF

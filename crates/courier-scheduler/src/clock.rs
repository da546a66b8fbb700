use std::sync::Mutex;

use chrono::{FixedOffset, Utc};
use courier_store::ScheduledAt;

/// Source of "now" for due-job scans, in the civil zone jobs are written in.
pub trait Clock: Send + Sync {
    fn now(&self) -> ScheduledAt;
}

/// Wall clock shifted to a fixed UTC offset, truncated to the minute.
#[derive(Debug, Clone, Copy)]
pub struct CivilClock {
    offset: FixedOffset,
}

impl CivilClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Clock for CivilClock {
    fn now(&self) -> ScheduledAt {
        ScheduledAt::new(Utc::now().with_timezone(&self.offset).naive_local())
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<ScheduledAt>,
}

impl ManualClock {
    pub fn new(start: ScheduledAt) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: ScheduledAt) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = at;
    }

    pub fn advance_minutes(&self, minutes: i64) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now = now.add_minutes(minutes);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> ScheduledAt {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn civil_clock_is_minute_resolution() {
        let clock = CivilClock::new(FixedOffset::east_opt(9 * 3600).unwrap());
        let now = clock.now().as_naive();
        assert_eq!(now.second(), 0);
        assert_eq!(now.nanosecond(), 0);
    }

    #[test]
    fn civil_clock_applies_offset() {
        let utc = CivilClock::new(FixedOffset::east_opt(0).unwrap()).now();
        let tokyo = CivilClock::new(FixedOffset::east_opt(9 * 3600).unwrap()).now();
        let diff = (tokyo.as_naive() - utc.as_naive()).num_minutes();
        // allow for a minute boundary between the two reads
        assert!((539..=541).contains(&diff), "diff was {diff}");
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(ScheduledAt::parse("2024-01-01T09:00").unwrap());
        clock.advance_minutes(61);
        assert_eq!(clock.now().to_string(), "2024-01-01T10:01");
        clock.set(ScheduledAt::parse("2025-06-01T00:00").unwrap());
        assert_eq!(clock.now().to_string(), "2025-06-01T00:00");
    }
}

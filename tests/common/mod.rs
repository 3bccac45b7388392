//! Common test utilities shared across integration tests.

use chrono::{DateTime, TimeZone, Utc};
use virtualdate::{FieldPattern, TimePattern};

/// Shorthand UTC instant constructor.
pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// Pattern pinning a month and day.
pub fn on_date(month: i32, day: i32) -> TimePattern {
    TimePattern {
        month: FieldPattern::Exact(month),
        day: FieldPattern::Exact(day),
        ..Default::default()
    }
}

/// Pattern pinning an hour and minute.
pub fn at_time(hour: i32, minute: i32) -> TimePattern {
    TimePattern {
        hour: FieldPattern::Exact(hour),
        minute: FieldPattern::Exact(minute),
        ..Default::default()
    }
}

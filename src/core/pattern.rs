//! Time patterns: recurring or broadly-defined moments in civil time.
//!
//! A `TimePattern` is a record of eleven [`FieldPattern`] slots plus an
//! optional location. Matching converts the queried instant into the
//! pattern's location and tests every slot against the civil fields there,
//! so "last Saturday of the month at noon in Berlin" stays correct across
//! UTC offsets and DST transitions.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Utc,
};
use chrono_tz::Tz;

use crate::core::calendar;
use crate::core::field::{FieldPattern, PatternError};

/// Number of passes materialization makes to reconcile week, day-of-week and
/// day-of-year with the already-chosen date.
const RECONCILE_ITERATIONS: usize = 10;

/// A pattern over civil time.
///
/// Every slot defaults to [`FieldPattern::Unset`], which matches anything;
/// an empty pattern therefore matches every instant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimePattern {
    pub year: FieldPattern,
    pub month: FieldPattern,
    pub day: FieldPattern,
    pub week: FieldPattern,
    pub day_of_week: FieldPattern,
    pub day_of_year: FieldPattern,
    pub hour: FieldPattern,
    pub minute: FieldPattern,
    pub second: FieldPattern,
    pub millisecond: FieldPattern,
    pub nanosecond: FieldPattern,
    /// Location whose civil fields the pattern constrains. `None` means UTC.
    pub location: Option<Tz>,
}

impl TimePattern {
    /// An empty pattern that matches every instant.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rigid pattern matching exactly the given instant's UTC civil fields.
    ///
    /// Milliseconds are left unset and nanoseconds pinned, the common shape
    /// for then clearing slots selectively.
    pub fn from_instant(t: DateTime<Utc>) -> Self {
        Self::from_instant_with(t, false, true)
    }

    /// Like [`TimePattern::from_instant`] with explicit sub-second handling.
    pub fn from_instant_with(t: DateTime<Utc>, include_millis: bool, include_nanos: bool) -> Self {
        Self::from_fields(t.naive_utc(), None, include_millis, include_nanos)
    }

    /// Rigid pattern in the instant's own location.
    pub fn from_instant_in(t: DateTime<Tz>, include_millis: bool, include_nanos: bool) -> Self {
        Self::from_fields(
            t.naive_local(),
            Some(t.timezone()),
            include_millis,
            include_nanos,
        )
    }

    fn from_fields(
        local: NaiveDateTime,
        location: Option<Tz>,
        include_millis: bool,
        include_nanos: bool,
    ) -> Self {
        let date = local.date();
        let time = local.time();
        let nanos = time.nanosecond().min(999_999_999);
        TimePattern {
            year: FieldPattern::Exact(date.year()),
            month: FieldPattern::Exact(date.month() as i32),
            day: FieldPattern::Exact(date.day() as i32),
            week: FieldPattern::Exact(calendar::week_of_year(date) as i32),
            day_of_week: FieldPattern::Exact(calendar::day_of_week(date) as i32),
            day_of_year: FieldPattern::Exact(calendar::day_of_year(date) as i32),
            hour: FieldPattern::Exact(time.hour() as i32),
            minute: FieldPattern::Exact(time.minute() as i32),
            second: FieldPattern::Exact(time.second() as i32),
            millisecond: if include_millis {
                FieldPattern::Exact((nanos / 1_000_000) as i32)
            } else {
                FieldPattern::Unset
            },
            nanosecond: if include_nanos {
                FieldPattern::Exact(nanos as i32)
            } else {
                FieldPattern::Unset
            },
            location,
        }
    }

    /// Set hour through nanosecond to `Unset`.
    pub fn clear_time(&mut self) {
        self.hour = FieldPattern::Unset;
        self.minute = FieldPattern::Unset;
        self.second = FieldPattern::Unset;
        self.millisecond = FieldPattern::Unset;
        self.nanosecond = FieldPattern::Unset;
    }

    /// Set year through day-of-year to `Unset`.
    pub fn clear_date(&mut self) {
        self.year = FieldPattern::Unset;
        self.month = FieldPattern::Unset;
        self.day = FieldPattern::Unset;
        self.week = FieldPattern::Unset;
        self.day_of_week = FieldPattern::Unset;
        self.day_of_year = FieldPattern::Unset;
    }

    /// True when every slot is either `Unset` or `Exact`, i.e. the pattern
    /// describes at most one instant per location.
    pub fn is_materialized(&self) -> bool {
        self.slots()
            .iter()
            .all(|slot| slot.is_unset() || slot.is_exact())
    }

    fn slots(&self) -> [&FieldPattern; 11] {
        [
            &self.year,
            &self.month,
            &self.day,
            &self.week,
            &self.day_of_week,
            &self.day_of_year,
            &self.hour,
            &self.minute,
            &self.second,
            &self.millisecond,
            &self.nanosecond,
        ]
    }

    fn set_slot(&mut self, index: usize, value: FieldPattern) {
        match index {
            0 => self.year = value,
            1 => self.month = value,
            2 => self.day = value,
            3 => self.week = value,
            4 => self.day_of_week = value,
            5 => self.day_of_year = value,
            6 => self.hour = value,
            7 => self.minute = value,
            8 => self.second = value,
            9 => self.millisecond = value,
            _ => self.nanosecond = value,
        }
    }

    /// The instant's civil date and time in the pattern's location.
    fn local(&self, t: DateTime<Utc>) -> NaiveDateTime {
        match self.location {
            Some(tz) => t.with_timezone(&tz).naive_local(),
            None => t.naive_utc(),
        }
    }

    /// Whether the six date slots accept the instant.
    pub fn matches_date(&self, t: DateTime<Utc>) -> bool {
        let date = self.local(t).date();
        self.year.matches(date.year(), Some(9999))
            && self.month.matches(date.month() as i32, Some(12))
            && self.day.matches(
                date.day() as i32,
                Some(calendar::days_in_month(date.year(), date.month()) as i32),
            )
            && self.week.matches(
                calendar::week_of_year(date) as i32,
                Some(calendar::weeks_in_year(date.year()) as i32),
            )
            && self
                .day_of_week
                .matches(calendar::day_of_week(date) as i32, Some(7))
            && self.day_of_year.matches(
                calendar::day_of_year(date) as i32,
                Some(calendar::days_in_year(date.year()) as i32),
            )
    }

    /// Whether the five time slots accept the instant.
    pub fn matches_time(&self, t: DateTime<Utc>) -> bool {
        let time = self.local(t).time();
        let nanos = time.nanosecond().min(999_999_999);
        self.hour.matches(time.hour() as i32, Some(23))
            && self.minute.matches(time.minute() as i32, Some(59))
            && self.second.matches(time.second() as i32, Some(59))
            && self
                .millisecond
                .matches((nanos / 1_000_000) as i32, Some(999))
            && self.nanosecond.matches(nanos as i32, Some(999_999_999))
    }

    /// Whether all eleven slots accept the instant.
    pub fn matches(&self, t: DateTime<Utc>) -> bool {
        self.matches_date(t) && self.matches_time(t)
    }

    /// Turn the pattern into a concrete instant near `hint`.
    ///
    /// Year through nanosecond are chosen slot-by-slot against the hint's
    /// fields, then up to [`RECONCILE_ITERATIONS`] passes advance the date
    /// until week, day-of-week and day-of-year are all satisfied.
    pub fn materialize(&self, hint: DateTime<Utc>) -> Result<DateTime<Utc>, PatternError> {
        let local_hint = self.local(hint);
        let hint_date = local_hint.date();
        let hint_time = local_hint.time();

        let year = self.year.materialize(hint_date.year(), Some(9999), true);
        let month = self
            .month
            .materialize(hint_date.month() as i32, Some(12), true)
            .clamp(1, 12) as u32;
        let days = calendar::days_in_month(year, month) as i32;
        let day = self
            .day
            .materialize(hint_date.day() as i32, Some(days), true)
            .clamp(1, days) as u32;

        let hour = self
            .hour
            .materialize(hint_time.hour() as i32, Some(23), true)
            .clamp(0, 23) as u32;
        let minute = self
            .minute
            .materialize(hint_time.minute() as i32, Some(59), true)
            .clamp(0, 59) as u32;
        let second = self
            .second
            .materialize(hint_time.second() as i32, Some(59), true)
            .clamp(0, 59) as u32;
        let hint_nanos = hint_time.nanosecond().min(999_999_999);
        let nanos = if self.nanosecond.is_unset() && !self.millisecond.is_unset() {
            let millis = self
                .millisecond
                .materialize((hint_nanos / 1_000_000) as i32, Some(999), true)
                .clamp(0, 999);
            (millis * 1_000_000) as u32
        } else {
            self.nanosecond
                .materialize(hint_nanos as i32, Some(999_999_999), true)
                .clamp(0, 999_999_999) as u32
        };

        let mut date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            PatternError::Unreconcilable(format!("no such date {:04}-{:02}-{:02}", year, month, day))
        })?;
        let time = NaiveTime::from_hms_nano_opt(hour, minute, second, nanos).ok_or_else(|| {
            PatternError::Unreconcilable(format!(
                "no such time {:02}:{:02}:{:02}.{:09}",
                hour, minute, second, nanos
            ))
        })?;

        for _ in 0..RECONCILE_ITERATIONS {
            let mut adjusted = false;

            let current = calendar::week_of_year(date) as i32;
            let wrap = calendar::weeks_in_year(date.year()) as i32;
            let required = self.week.materialize(current, Some(wrap), true);
            if required != current {
                date += Duration::weeks((required - current).rem_euclid(wrap) as i64);
                adjusted = true;
            }

            let current = calendar::day_of_week(date) as i32;
            let required = self.day_of_week.materialize(current, Some(7), true);
            if required != current {
                date += Duration::days((required - current).rem_euclid(7) as i64);
                adjusted = true;
            }

            let current = calendar::day_of_year(date) as i32;
            let wrap = calendar::days_in_year(date.year()) as i32;
            let required = self.day_of_year.materialize(current, Some(wrap), true);
            if required != current {
                date += Duration::days((required - current).rem_euclid(wrap) as i64);
                adjusted = true;
            }

            if !adjusted {
                return self.localize(NaiveDateTime::new(date, time));
            }
        }

        Err(PatternError::Unreconcilable(
            "week, day-of-week and day-of-year constraints did not converge".into(),
        ))
    }

    fn localize(&self, naive: NaiveDateTime) -> Result<DateTime<Utc>, PatternError> {
        match self.location {
            None => Ok(Utc.from_utc_datetime(&naive)),
            Some(tz) => match tz.from_local_datetime(&naive) {
                LocalResult::Single(t) => Ok(t.with_timezone(&Utc)),
                // Of a repeated local time, take the earlier instant.
                LocalResult::Ambiguous(earlier, _) => Ok(earlier.with_timezone(&Utc)),
                LocalResult::None => Err(PatternError::Unreconcilable(format!(
                    "local time {} does not exist in {}",
                    naive, tz
                ))),
            },
        }
    }

    /// Cartesian-product expansion over every slot's enumeration.
    ///
    /// Year is the outermost axis and nanosecond the innermost; `Unset` and
    /// `Predicate` slots are carried through unchanged.
    pub fn expand(&self) -> Vec<TimePattern> {
        let members: Vec<Vec<FieldPattern>> =
            self.slots().iter().map(|slot| slot.expand()).collect();
        let mut index = [0usize; 11];
        let mut out = Vec::new();
        'assemble: loop {
            let mut pattern = self.clone();
            for (slot, &i) in index.iter().enumerate() {
                pattern.set_slot(slot, members[slot][i].clone());
            }
            out.push(pattern);

            let mut slot = index.len();
            loop {
                if slot == 0 {
                    break 'assemble;
                }
                slot -= 1;
                index[slot] += 1;
                if index[slot] < members[slot].len() {
                    continue 'assemble;
                }
                index[slot] = 0;
            }
        }
        out
    }
}

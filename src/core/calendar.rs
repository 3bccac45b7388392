//! Civil-calendar arithmetic.
//!
//! Pure functions over Gregorian dates used by pattern matching and
//! materialization: month/year lengths and the week numbering scheme the
//! matcher exposes through the `week` slot.

use chrono::{Datelike, NaiveDate};

/// Whether `year` is a Gregorian leap year.
pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in the given month (28..=31).
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

/// Number of days in the given year (365 or 366).
pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// Day of the week with Monday = 1 .. Sunday = 7.
pub fn day_of_week(date: NaiveDate) -> u32 {
    date.weekday().number_from_monday()
}

/// Ordinal day of the year (1..=366).
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

/// Week of the year in the 0..=53 scheme.
///
/// The first Monday of the year starts week 1. Days before it carry week 0
/// and belong to the final week of the previous year. Years that begin on a
/// Monday and are long enough run up to week 53.
pub fn week_of_year(date: NaiveDate) -> u32 {
    let first_monday = first_monday_of_year(date.year());
    if date < first_monday {
        0
    } else {
        (date - first_monday).num_days() as u32 / 7 + 1
    }
}

/// Number of the last week of the year, i.e. the week carried by December 31.
pub fn weeks_in_year(year: i32) -> u32 {
    // December 31 always exists.
    week_of_year(NaiveDate::from_ymd_opt(year, 12, 31).unwrap())
}

fn first_monday_of_year(year: i32) -> NaiveDate {
    // January 1 always exists.
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
    let offset = (8 - jan1.weekday().number_from_monday()) % 7;
    jan1 + chrono::Duration::days(offset as i64)
}

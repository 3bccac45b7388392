//! Pattern matching and shift semantics through the public API.

use chrono::Duration;
use virtualdate::{
    FieldPattern, OnResult, Resolution, ShiftPolicy, TaskPattern, TimePattern,
};

use crate::common::{on_date, utc};

#[test]
fn test_negative_day_wrap() {
    let pattern = TimePattern {
        month: FieldPattern::Exact(5),
        day: FieldPattern::Exact(-2),
        ..Default::default()
    };
    assert!(pattern.matches(utc(2018, 5, 30, 0, 0, 0)));
    assert!(!pattern.matches(utc(2018, 5, 31, 0, 0, 0)));
}

#[test]
fn test_negative_day_wrap_tracks_month_length() {
    // -1 is the last day of whichever month is being matched.
    let pattern = TimePattern {
        day: FieldPattern::Exact(-1),
        ..Default::default()
    };
    assert!(pattern.matches(utc(2019, 2, 28, 0, 0, 0)));
    assert!(pattern.matches(utc(2020, 2, 29, 0, 0, 0)));
    assert!(pattern.matches(utc(2020, 4, 30, 0, 0, 0)));
    assert!(!pattern.matches(utc(2020, 4, 29, 0, 0, 0)));
}

#[test]
fn test_step_range() {
    let pattern = TimePattern {
        month: FieldPattern::Exact(3),
        day: FieldPattern::stepped(10, 20, 2).unwrap(),
        ..Default::default()
    };
    assert!(pattern.matches(utc(2017, 3, 16, 0, 0, 0)));
    assert!(!pattern.matches(utc(2017, 3, 15, 0, 0, 0)));
}

#[test]
fn test_last_saturday_of_month_afternoon() {
    // The motivating example: last Saturday of every month, noon to 4pm.
    let pattern = TimePattern {
        day: FieldPattern::range(-7, -1, true).unwrap(),
        day_of_week: FieldPattern::Exact(6),
        hour: FieldPattern::range(12, 16, false).unwrap(),
        ..Default::default()
    };
    // 2023-05-27 was the last Saturday of May.
    assert!(pattern.matches(utc(2023, 5, 27, 12, 0, 0)));
    assert!(pattern.matches(utc(2023, 5, 27, 15, 59, 59)));
    assert!(!pattern.matches(utc(2023, 5, 27, 16, 0, 0)));
    // A Saturday, but not the last one.
    assert!(!pattern.matches(utc(2023, 5, 20, 13, 0, 0)));
}

#[test]
fn test_from_instant_round_trip_invariant() {
    for t in [
        utc(2017, 3, 15, 0, 0, 0),
        utc(2020, 2, 29, 23, 59, 59),
        utc(1999, 12, 31, 12, 30, 45),
        utc(2018, 1, 1, 6, 0, 0),
    ] {
        assert!(TimePattern::from_instant(t).matches(t), "failed for {}", t);
    }
}

#[test]
fn test_omit_with_shift_duration() {
    let task = TaskPattern::new("shifting")
        .with_due(on_date(3, 15))
        .with_omit(on_date(3, 15))
        .with_shift(ShiftPolicy::By(Duration::days(1)));

    assert_eq!(
        task.strict_on(utc(2017, 3, 15, 0, 0, 0)),
        OnResult::Shifted(Duration::days(1))
    );
    assert!(task.on(utc(2017, 3, 16, 0, 0, 0)));
    assert_eq!(
        task.resolve(utc(2017, 3, 15, 0, 0, 0)),
        Resolution::At(utc(2017, 3, 16, 0, 0, 0))
    );
}

#[test]
fn test_max_shift_rejection() {
    let due = TimePattern {
        year: FieldPattern::Exact(2017),
        month: FieldPattern::Exact(3),
        day: FieldPattern::Exact(15),
        ..Default::default()
    };
    let omit = TimePattern {
        year: FieldPattern::Exact(2017),
        month: FieldPattern::Exact(3),
        day: FieldPattern::range(15, 16, true).unwrap(),
        ..Default::default()
    };
    let task = TaskPattern::new("walled")
        .with_due(due)
        .with_omit(omit)
        .with_shift(ShiftPolicy::By(Duration::days(1)))
        .with_max_shift(Duration::days(1));

    assert!(!task.on(utc(2017, 3, 15, 0, 0, 0)));
}

#[test]
fn test_task_without_due_is_always_due_within_bounds() {
    let mut task = TaskPattern::new("open");
    task.begin = Some(virtualdate::TimeRef::At(utc(2020, 1, 1, 0, 0, 0)));
    assert_eq!(task.strict_on(utc(2019, 12, 31, 0, 0, 0)), OnResult::NotDue);
    assert_eq!(task.strict_on(utc(2020, 6, 1, 0, 0, 0)), OnResult::On);
}

#[test]
fn test_task_without_omit_never_shifts() {
    let task = TaskPattern::new("calm")
        .with_due(on_date(3, 15))
        .with_shift(ShiftPolicy::By(Duration::days(1)));
    // Nothing is omitted, so a matching due time is plainly on and the
    // result is never a duration.
    for day in 1..=31 {
        let t = utc(2017, 3, day, 0, 0, 0);
        let result = task.strict_on(t);
        assert!(
            matches!(result, OnResult::On | OnResult::NotDue),
            "unexpected {:?} at {}",
            result,
            t
        );
    }
}

#[test]
fn test_dual_relation() {
    let task = TaskPattern::new("dual")
        .with_due(on_date(3, 15))
        .with_omit(on_date(3, 15))
        .with_shift(ShiftPolicy::By(Duration::hours(8)));
    let base = utc(2017, 3, 15, 0, 0, 0);
    match task.strict_on(base) {
        OnResult::Shifted(delta) => assert!(task.on(base + delta)),
        other => panic!("expected a shifted result, got {:?}", other),
    }
}

#[test]
fn test_expand_covers_every_member() {
    let pattern = TimePattern {
        month: FieldPattern::List(vec![3, 6]),
        day: FieldPattern::Exact(15),
        ..Default::default()
    };
    let members = pattern.expand();
    assert_eq!(members.len(), 2);
    assert!(members
        .iter()
        .any(|m| m.matches(utc(2017, 3, 15, 0, 0, 0))));
    assert!(members
        .iter()
        .any(|m| m.matches(utc(2017, 6, 15, 0, 0, 0))));
}

#[test]
fn test_week_zero_and_fifty_three() {
    let week0 = TimePattern {
        week: FieldPattern::Exact(0),
        ..Default::default()
    };
    // 2020 began on a Wednesday; January 1-5 precede the first Monday.
    assert!(week0.matches(utc(2020, 1, 3, 0, 0, 0)));
    assert!(!week0.matches(utc(2020, 1, 6, 0, 0, 0)));

    let week53 = TimePattern {
        week: FieldPattern::Exact(53),
        ..Default::default()
    };
    // 2018 began and ended on Mondays.
    assert!(week53.matches(utc(2018, 12, 31, 0, 0, 0)));
    assert!(!week53.matches(utc(2018, 12, 30, 0, 0, 0)));
}

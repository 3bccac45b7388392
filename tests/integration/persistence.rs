//! YAML persistence and iCalendar export end to end.

use chrono::Duration;
use virtualdate::{
    export_ical_at, ConfigError, FieldPattern, ScheduleError, Scheduler, ShiftPolicy, YamlLoader,
};

use crate::common::utc;

const DOCUMENT: &str = "\
schema_version: 2
tasks:
  - id: standup
    due:
      - day_of_week: 1..5
        hour: 9
        minute: 0
    duration: 900
    flags: [meeting]
    parallel: 2
  - id: notes
    due:
      - day_of_week: 1..5
        hour: 9
        minute: 0
    duration: 600
    depends_on: [standup]
";

#[test]
fn test_load_build_export_pipeline() {
    let tasks = YamlLoader::parse_tasks(DOCUMENT).unwrap();
    let scheduler = Scheduler::with_tasks(tasks);

    // 2023-05-10 was a Wednesday.
    let from = utc(2023, 5, 10, 0, 0, 0);
    let to = utc(2023, 5, 11, 0, 0, 0);
    let schedule = scheduler.build(from, to).unwrap();
    assert_eq!(schedule.len(), 2);

    let standup = schedule.iter().find(|i| i.task.id == "standup").unwrap();
    let notes = schedule.iter().find(|i| i.task.id == "notes").unwrap();
    assert_eq!(standup.start, utc(2023, 5, 10, 9, 0, 0));
    assert!(notes.start >= standup.finish);

    let stamp = utc(2023, 5, 1, 0, 0, 0);
    let ical = export_ical_at("Team", &schedule, stamp);
    assert!(ical.contains("BEGIN:VEVENT"));
    assert!(ical.contains("SUMMARY:standup"));
    assert!(ical.contains("SUMMARY:notes"));
    assert!(ical.contains("CATEGORIES:meeting"));
    assert!(ical.ends_with("\r\n"));
}

#[test]
fn test_weekend_day_produces_no_placements() {
    let tasks = YamlLoader::parse_tasks(DOCUMENT).unwrap();
    let scheduler = Scheduler::with_tasks(tasks);
    // 2023-05-13 was a Saturday; notes depends on standup, and neither is
    // placeable, so the dependent raises.
    let from = utc(2023, 5, 13, 0, 0, 0);
    let to = utc(2023, 5, 14, 0, 0, 0);
    assert!(matches!(
        scheduler.build(from, to),
        Err(ScheduleError::UnsatisfiableDependency(_))
    ));
}

#[test]
fn test_schema_round_trip_stays_loadable() {
    let tasks = YamlLoader::parse_tasks(DOCUMENT).unwrap();
    let rendered = YamlLoader::to_yaml(&tasks).unwrap();
    assert!(rendered.contains("schema_version: 2"));
    let reloaded = YamlLoader::parse_tasks(&rendered).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded[0].id, "standup");
    assert_eq!(reloaded[0].parallel, 2);
    assert_eq!(
        reloaded[0].due[0].day_of_week,
        FieldPattern::Range {
            lo: 1,
            hi: 5,
            inclusive: true
        }
    );
    assert_eq!(reloaded[1].depends_on, vec!["standup"]);
}

#[test]
fn test_legacy_sequence_loads_and_saves_versioned() {
    let legacy = "\
- id: old
  duration: 60
  shift: true
";
    let tasks = YamlLoader::parse_tasks(legacy).unwrap();
    assert_eq!(tasks[0].shift, ShiftPolicy::Always);
    assert_eq!(tasks[0].duration, Duration::minutes(1));

    // Saving always emits the current schema.
    let rendered = YamlLoader::to_yaml(&tasks).unwrap();
    assert!(rendered.contains("schema_version: 2"));
    assert!(rendered.contains("tasks:"));
}

#[test]
fn test_validation_errors_carry_positions() {
    let broken = "\
schema_version: 2
tasks:
  - id: one
    parallel: 0
  - id: one
    due:
      - day: not_a_pattern
";
    let err = YamlLoader::parse_tasks(broken).unwrap_err();
    let ConfigError::Validation(issues) = err else {
        panic!("expected accumulated validation errors");
    };
    assert_eq!(issues.len(), 3);
    for issue in &issues {
        assert!(issue.line > 0, "issue missing a line: {}", issue);
    }
    assert!(issues.iter().any(|i| i.message.contains("parallel")));
    assert!(issues.iter().any(|i| i.message.contains("duplicate")));
    assert!(issues.iter().any(|i| i.message.contains("due.day")));
}

#[test]
fn test_loaded_tasks_schedule_with_shift() {
    let yaml = "\
schema_version: 2
tasks:
  - id: mover
    due:
      - year: 2017
        month: 3
        day: 15
    omit:
      - year: 2017
        month: 3
        day: 15
    shift: 86400
";
    let tasks = YamlLoader::parse_tasks(yaml).unwrap();
    let scheduler = Scheduler::with_tasks(tasks);
    let from = utc(2017, 3, 15, 0, 0, 0);
    let to = utc(2017, 3, 20, 0, 0, 0);
    let schedule = scheduler.build(from, to).unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].start, utc(2017, 3, 16, 0, 0, 0));
}

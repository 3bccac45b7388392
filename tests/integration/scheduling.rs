//! Schedule construction scenarios.

use chrono::{DateTime, Duration, Utc};
use virtualdate::{
    on_in_schedule, FieldPattern, ScheduleError, Scheduler, TaskPattern, TimePattern, TimeRef,
};

use crate::common::{at_time, utc};

fn day_window() -> (DateTime<Utc>, DateTime<Utc>) {
    (utc(2023, 5, 10, 0, 0, 0), utc(2023, 5, 11, 0, 0, 0))
}

#[test]
fn test_dependency_on_fixed_task() {
    let mut scheduler = Scheduler::new();
    scheduler.add_task(
        TaskPattern::new("a")
            .with_fixed(true)
            .with_due(at_time(9, 0))
            .with_duration(Duration::hours(2)),
    );
    scheduler.add_task(
        TaskPattern::new("b")
            .with_due(at_time(9, 0))
            .with_duration(Duration::hours(1))
            .with_dependency("a"),
    );
    let (from, to) = day_window();
    let schedule = scheduler.build(from, to).unwrap();

    let a = schedule.iter().find(|i| i.task.id == "a").unwrap();
    let b = schedule.iter().find(|i| i.task.id == "b").unwrap();
    assert_eq!(a.start, utc(2023, 5, 10, 9, 0, 0));
    assert_eq!(a.finish, utc(2023, 5, 10, 11, 0, 0));
    assert!(b.start >= a.finish);
}

#[test]
fn test_stagger_produces_three_instances() {
    let mut scheduler = Scheduler::new();
    scheduler.add_task(
        TaskPattern::new("fanned")
            .with_due(at_time(10, 0))
            .with_parallel(3)
            .with_stagger(Duration::minutes(30))
            .with_duration(Duration::hours(1)),
    );
    let (from, to) = day_window();
    let schedule = scheduler.build(from, to).unwrap();
    let starts: Vec<_> = schedule.iter().map(|i| i.start).collect();
    assert_eq!(
        starts,
        vec![
            utc(2023, 5, 10, 10, 0, 0),
            utc(2023, 5, 10, 10, 30, 0),
            utc(2023, 5, 10, 11, 0, 0),
        ]
    );
}

#[test]
fn test_parallelism_cap_with_shared_flag() {
    let mut scheduler = Scheduler::new();
    for id in ["m1", "m2", "m3"] {
        scheduler.add_task(
            TaskPattern::new(id)
                .with_due(at_time(10, 0))
                .with_flag("meeting")
                .with_parallel(2)
                .with_duration(Duration::hours(1)),
        );
    }
    let (from, to) = day_window();
    let schedule = scheduler.build(from, to).unwrap();
    assert_eq!(schedule.len(), 3);

    let at_ten: Vec<_> = schedule
        .iter()
        .filter(|i| i.start == utc(2023, 5, 10, 10, 0, 0))
        .collect();
    assert_eq!(at_ten.len(), 2);
    let moved = schedule
        .iter()
        .find(|i| i.start != utc(2023, 5, 10, 10, 0, 0))
        .unwrap();
    assert!(moved.start >= utc(2023, 5, 10, 11, 0, 0));
}

#[test]
fn test_deadline_rejects_placement() {
    let mut scheduler = Scheduler::new();
    scheduler.add_task(
        TaskPattern::new("late")
            .with_due(at_time(9, 0))
            .with_duration(Duration::hours(2))
            .with_deadline(TimeRef::At(utc(2023, 5, 10, 10, 0, 0))),
    );
    let (from, to) = day_window();
    assert!(scheduler.build(from, to).unwrap().is_empty());
}

#[test]
fn test_deadline_law_for_placed_instances() {
    let mut scheduler = Scheduler::new();
    scheduler.add_task(
        TaskPattern::new("tight")
            .with_due(at_time(9, 0))
            .with_duration(Duration::minutes(45))
            .with_deadline(TimeRef::At(utc(2023, 5, 10, 10, 0, 0))),
    );
    let (from, to) = day_window();
    let schedule = scheduler.build(from, to).unwrap();
    for instance in &schedule {
        assert!(instance.finish <= utc(2023, 5, 10, 10, 0, 0));
    }
    assert_eq!(schedule.len(), 1);
}

#[test]
fn test_topological_law() {
    let mut scheduler = Scheduler::new();
    scheduler.add_task(
        TaskPattern::new("root")
            .with_due(at_time(8, 0))
            .with_duration(Duration::hours(1)),
    );
    scheduler.add_task(
        TaskPattern::new("mid")
            .with_due(at_time(8, 0))
            .with_duration(Duration::hours(1))
            .with_dependency("root"),
    );
    scheduler.add_task(
        TaskPattern::new("leaf")
            .with_due(at_time(8, 0))
            .with_duration(Duration::minutes(30))
            .with_dependency("mid"),
    );
    let (from, to) = day_window();
    let schedule = scheduler.build(from, to).unwrap();
    assert_eq!(schedule.len(), 3);

    for (task_id, dep_id) in [("mid", "root"), ("leaf", "mid")] {
        let instance = schedule.iter().find(|i| i.task.id == task_id).unwrap();
        let dependency = schedule.iter().find(|i| i.task.id == dep_id).unwrap();
        assert!(
            instance.start >= dependency.finish,
            "{} started before {} finished",
            task_id,
            dep_id
        );
    }
}

#[test]
fn test_half_open_parallelism_invariant() {
    let mut scheduler = Scheduler::new();
    for id in ["w1", "w2", "w3", "w4"] {
        scheduler.add_task(
            TaskPattern::new(id)
                .with_due(at_time(9, 0))
                .with_flag("worker")
                .with_parallel(2)
                .with_duration(Duration::hours(2)),
        );
    }
    let (from, to) = day_window();
    let schedule = scheduler.build(from, to).unwrap();
    assert_eq!(schedule.len(), 4);

    // Sample the whole window at minute resolution: never more than two
    // flag-sharing instances covering one point.
    let mut cursor = from;
    while cursor < to {
        let covering = schedule
            .iter()
            .filter(|i| i.start <= cursor && cursor < i.finish)
            .count();
        assert!(covering <= 2, "{} instances cover {}", covering, cursor);
        cursor += Duration::minutes(1);
    }
}

#[test]
fn test_build_is_deterministic() {
    let build_once = || {
        let mut scheduler = Scheduler::new();
        for (id, priority) in [("gamma", 1), ("alpha", 3), ("beta", 3)] {
            scheduler.add_task(
                TaskPattern::new(id)
                    .with_due(at_time(10, 0))
                    .with_priority(priority)
                    .with_duration(Duration::hours(1)),
            );
        }
        scheduler.add_task(
            TaskPattern::new("pinned")
                .with_fixed(true)
                .with_due(at_time(10, 0))
                .with_duration(Duration::hours(1)),
        );
        let (from, to) = day_window();
        scheduler
            .build(from, to)
            .unwrap()
            .iter()
            .map(|i| (i.task.id.clone(), i.start, i.finish))
            .collect::<Vec<_>>()
    };
    let first = build_once();
    let second = build_once();
    assert_eq!(first, second);
    // The fixed task wins the only conflict-free slot.
    assert_eq!(first[0].0, "pinned");
    assert_eq!(first[0].1, utc(2023, 5, 10, 10, 0, 0));
}

#[test]
fn test_cycle_reported() {
    let mut scheduler = Scheduler::new();
    scheduler.add_task(TaskPattern::new("a").with_dependency("c"));
    scheduler.add_task(TaskPattern::new("b").with_dependency("a"));
    scheduler.add_task(TaskPattern::new("c").with_dependency("b"));
    let (from, to) = day_window();
    match scheduler.build(from, to) {
        Err(ScheduleError::Cycle(names)) => {
            assert!(names.contains('a') && names.contains('b') && names.contains('c'));
        }
        other => panic!("expected a cycle error, got {:?}", other.map(|s| s.len())),
    }
}

#[test]
fn test_on_in_schedule_zero_duration_coincidence() {
    let mut scheduler = Scheduler::new();
    scheduler.add_task(TaskPattern::new("marker").with_due(at_time(12, 0)));
    let (from, to) = day_window();
    let schedule = scheduler.build(from, to).unwrap();
    assert!(on_in_schedule(&schedule, "marker", utc(2023, 5, 10, 12, 0, 0)));
    assert!(!on_in_schedule(
        &schedule,
        "marker",
        utc(2023, 5, 10, 12, 0, 1)
    ));
    assert!(!on_in_schedule(&schedule, "other", utc(2023, 5, 10, 12, 0, 0)));
}

#[test]
fn test_schedule_sorted_by_start() {
    let mut scheduler = Scheduler::new();
    scheduler.add_task(TaskPattern::new("noon").with_due(at_time(12, 0)));
    scheduler.add_task(TaskPattern::new("dawn").with_due(at_time(6, 0)));
    scheduler.add_task(TaskPattern::new("dusk").with_due(at_time(18, 0)));
    let (from, to) = day_window();
    let schedule = scheduler.build(from, to).unwrap();
    let starts: Vec<_> = schedule.iter().map(|i| i.start).collect();
    let mut sorted = starts.clone();
    sorted.sort();
    assert_eq!(starts, sorted);
}

#[test]
fn test_window_excludes_due_times_outside() {
    let mut scheduler = Scheduler::new();
    scheduler.add_task(TaskPattern::new("elsewhere").with_due(TimePattern {
        year: FieldPattern::Exact(2024),
        ..Default::default()
    }));
    let (from, to) = day_window();
    assert!(scheduler.build(from, to).unwrap().is_empty());
}

#[test]
fn test_explanation_bound_holds() {
    // Many same-priority one-minute conflicts force a long shift chain.
    let mut scheduler = Scheduler::new();
    for i in 0..3 {
        scheduler.add_task(
            TaskPattern::new(format!("task{}", i))
                .with_due(at_time(0, 0))
                .with_duration(Duration::hours(8)),
        );
    }
    let (from, to) = day_window();
    let schedule = scheduler.build(from, to).unwrap();
    for instance in &schedule {
        assert!(instance.explanation.len() <= 101);
    }
}

//! Scheduler engine implementation.
//!
//! `Scheduler::build` produces placements in four phases:
//! - validate arguments and resolve dependency ids,
//! - order tasks topologically with a deterministic tie-break,
//! - place each task by scanning for its earliest admissible start and
//!   resolving conflicts against already-placed instances,
//! - sort the result by start, stable over the emission order.
//!
//! Every decision taken for a candidate is appended to its explanation
//! trace, capped by [`crate::core::explain::MAX_LINES`].

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::core::explain::Explanation;
use crate::core::field::PatternError;
use crate::core::task::{OnResult, ShiftPolicy, TaskPattern, TimeRef};

/// Iteration cap for the minute-resolution earliest-start scan.
const EARLIEST_SCAN_STEPS: usize = 10_000;

/// Synthetic flag used for parallelism accounting by tasks that declare none.
const DEFAULT_FLAG: &str = "default";

/// Errors that can occur while building a schedule.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A task carries an unusable attribute or references an unknown id.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The dependency graph contains a cycle.
    #[error("dependency cycle detected involving tasks: {0}")]
    Cycle(String),

    /// A task with downstream dependents could not be placed.
    #[error("dependent task could not be placed: {0}")]
    UnsatisfiableDependency(String),

    /// A deadline pattern failed to materialize.
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// One concrete placement emitted by the scheduler.
#[derive(Clone, Debug)]
pub struct ScheduledInstance<'a> {
    /// The task this placement belongs to.
    pub task: &'a TaskPattern,
    pub start: DateTime<Utc>,
    /// `start + duration`.
    pub finish: DateTime<Utc>,
    /// Trace of the decisions that produced this placement.
    pub explanation: Explanation,
}

impl ScheduledInstance<'_> {
    /// Whether the instance covers `t`: half-open for positive durations,
    /// exact coincidence for zero durations.
    pub fn covers(&self, t: DateTime<Utc>) -> bool {
        if self.task.duration.is_zero() {
            t == self.start
        } else {
            self.start <= t && t < self.finish
        }
    }

    fn overlaps(&self, start: DateTime<Utc>, finish: DateTime<Utc>) -> bool {
        self.start < finish && start < self.finish
    }
}

/// True when some instance of `task_id` covers `t`.
pub fn on_in_schedule(schedule: &[ScheduledInstance<'_>], task_id: &str, t: DateTime<Utc>) -> bool {
    schedule
        .iter()
        .any(|instance| instance.task.id == task_id && instance.covers(t))
}

/// Builds deterministic schedules from a task set.
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    tasks: Vec<TaskPattern>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<TaskPattern>) -> Self {
        Scheduler { tasks }
    }

    /// Register a task. Must not be called while a build is in flight,
    /// which the borrow checker enforces.
    pub fn add_task(&mut self, task: TaskPattern) {
        self.tasks.push(task);
    }

    pub fn tasks(&self) -> &[TaskPattern] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&TaskPattern> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Build the sorted placement list for the window `[from, to)`.
    pub fn build(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ScheduledInstance<'_>>, ScheduleError> {
        self.validate()?;
        let order = self.topological_order()?;
        let has_dependents = self.dependent_map();

        let mut placed: Vec<ScheduledInstance<'_>> = Vec::new();
        for &index in &order {
            let task = &self.tasks[index];

            // Dependency floor: dependents start no earlier than the latest
            // finish among their dependencies' instances.
            let mut dep_floor: Option<DateTime<Utc>> = None;
            let mut unplaced_dep = None;
            for dep_id in &task.depends_on {
                let finish = placed
                    .iter()
                    .filter(|i| i.task.id == *dep_id)
                    .map(|i| i.finish)
                    .max();
                match finish {
                    Some(f) => dep_floor = Some(dep_floor.map_or(f, |floor| floor.max(f))),
                    None => unplaced_dep = Some(dep_id.as_str()),
                }
            }
            if let Some(dep_id) = unplaced_dep {
                if has_dependents[index] {
                    return Err(ScheduleError::UnsatisfiableDependency(format!(
                        "'{}' requires '{}', which was not placed",
                        task.id, dep_id
                    )));
                }
                tracing::debug!(task = %task.id, dependency = dep_id, "skipped: dependency not placed");
                continue;
            }

            let Some(earliest) = self.earliest_start_time(task, from, to) else {
                if has_dependents[index] {
                    return Err(ScheduleError::UnsatisfiableDependency(format!(
                        "'{}' has no admissible start in the window",
                        task.id
                    )));
                }
                tracing::debug!(task = %task.id, "skipped: no admissible start in window");
                continue;
            };

            for start in self.candidate_starts(task, earliest, to) {
                let mut explanation = Explanation::new();
                explanation.push(format!("candidate start {}", start.to_rfc3339()));
                let mut start = start;
                if let Some(floor) = dep_floor {
                    if floor > start {
                        explanation
                            .push(format!("raised to dependency floor {}", floor.to_rfc3339()));
                        start = floor;
                    }
                }
                let accepted = self.schedule_candidate(
                    task,
                    start,
                    &mut placed,
                    to,
                    has_dependents[index],
                    explanation,
                )?;
                if !accepted && has_dependents[index] {
                    return Err(ScheduleError::UnsatisfiableDependency(format!(
                        "'{}' could not be placed but has dependents",
                        task.id
                    )));
                }
            }
        }

        // Stable sort: instances sharing a start keep topological emission
        // order.
        placed.sort_by_key(|instance| instance.start);
        Ok(placed)
    }

    fn validate(&self) -> Result<(), ScheduleError> {
        let mut ids = HashSet::new();
        for task in &self.tasks {
            if !ids.insert(task.id.as_str()) {
                return Err(ScheduleError::InvalidArgument(format!(
                    "duplicate task id '{}'",
                    task.id
                )));
            }
        }
        for task in &self.tasks {
            if task.parallel < 1 {
                return Err(ScheduleError::InvalidArgument(format!(
                    "'{}': parallel must be at least 1",
                    task.id
                )));
            }
            if task.duration < Duration::zero() {
                return Err(ScheduleError::InvalidArgument(format!(
                    "'{}': duration must not be negative",
                    task.id
                )));
            }
            if let Some(stagger) = task.stagger {
                if stagger <= Duration::zero() {
                    return Err(ScheduleError::InvalidArgument(format!(
                        "'{}': stagger must be positive",
                        task.id
                    )));
                }
            }
            for dep_id in &task.depends_on {
                if !ids.contains(dep_id.as_str()) {
                    return Err(ScheduleError::InvalidArgument(format!(
                        "'{}' depends on unknown task '{}'",
                        task.id, dep_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Kahn's algorithm with a deterministic tie-break among ready tasks:
    /// fixed first, then higher priority, then ascending id.
    fn topological_order(&self) -> Result<Vec<usize>, ScheduleError> {
        let count = self.tasks.len();
        let index_of: HashMap<&str, usize> = self
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.as_str(), i))
            .collect();

        let mut indegree = vec![0usize; count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (i, task) in self.tasks.iter().enumerate() {
            indegree[i] = task.depends_on.len();
            for dep_id in &task.depends_on {
                dependents[index_of[dep_id.as_str()]].push(i);
            }
        }

        let mut emitted = vec![false; count];
        let mut order = Vec::with_capacity(count);
        for _ in 0..count {
            let mut ready: Vec<usize> = (0..count)
                .filter(|&i| !emitted[i] && indegree[i] == 0)
                .collect();
            if ready.is_empty() {
                break;
            }
            ready.sort_by(|&a, &b| {
                let ta = &self.tasks[a];
                let tb = &self.tasks[b];
                tb.fixed
                    .cmp(&ta.fixed)
                    .then(tb.priority.cmp(&ta.priority))
                    .then(ta.id.cmp(&tb.id))
            });
            let pick = ready[0];
            emitted[pick] = true;
            order.push(pick);
            for &downstream in &dependents[pick] {
                indegree[downstream] -= 1;
            }
        }

        if order.len() != count {
            let cyclic: Vec<&str> = (0..count)
                .filter(|&i| !emitted[i])
                .map(|i| self.tasks[i].id.as_str())
                .collect();
            return Err(ScheduleError::Cycle(cyclic.join(", ")));
        }
        Ok(order)
    }

    fn dependent_map(&self) -> Vec<bool> {
        let mut has_dependents = vec![false; self.tasks.len()];
        for task in &self.tasks {
            for dep_id in &task.depends_on {
                if let Some(i) = self.tasks.iter().position(|t| t.id == *dep_id) {
                    has_dependents[i] = true;
                }
            }
        }
        has_dependents
    }

    /// Scan at minute resolution from `from` for the first admissible start.
    ///
    /// A shifted answer resolves the scan immediately: the shifted instant
    /// is the earliest placement of the due time found at the cursor.
    fn earliest_start_time(
        &self,
        task: &TaskPattern,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let mut cursor = from;
        for _ in 0..EARLIEST_SCAN_STEPS {
            if cursor >= to {
                return None;
            }
            match task.strict_on(cursor) {
                OnResult::On => return Some(cursor),
                OnResult::Shifted(delta) => return Some(cursor + delta),
                OnResult::NotDue | OnResult::Off => cursor += Duration::minutes(1),
            }
        }
        None
    }

    /// Candidate starts for one task: a stagger fan-out when configured
    /// with a parallel quota, otherwise the single earliest start.
    fn candidate_starts(
        &self,
        task: &TaskPattern,
        earliest: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<DateTime<Utc>> {
        match task.stagger {
            Some(stagger) if task.parallel > 1 => {
                let mut starts = Vec::new();
                for i in 0..task.parallel {
                    let start = earliest + stagger * (i as i32);
                    if start >= to {
                        break;
                    }
                    if task.omit_matches(start) {
                        continue;
                    }
                    starts.push(start);
                }
                starts
            }
            _ => vec![earliest],
        }
    }

    /// Place one candidate, resolving conflicts until it fits or is proven
    /// unplaceable. Returns whether an instance was appended.
    #[allow(clippy::too_many_arguments)]
    fn schedule_candidate<'a>(
        &'a self,
        task: &'a TaskPattern,
        mut start: DateTime<Utc>,
        placed: &mut Vec<ScheduledInstance<'a>>,
        horizon: DateTime<Utc>,
        has_dependents: bool,
        mut explanation: Explanation,
    ) -> Result<bool, ScheduleError> {
        loop {
            let finish = start + task.duration;
            // Zero-duration markers are accepted right up to the horizon.
            let past_horizon = if task.duration.is_zero() {
                start > horizon
            } else {
                finish > horizon
            };
            if past_horizon {
                return Ok(false);
            }

            if let Some(deadline) = &task.deadline {
                let at = match deadline {
                    TimeRef::At(at) => *at,
                    TimeRef::Matching(pattern) => pattern.materialize(start)?,
                };
                if finish > at {
                    explanation.push(format!("would miss deadline {}, dropped", at.to_rfc3339()));
                    return Ok(false);
                }
            }

            let conflict = if self.acceptable_parallelism(task, start, finish, placed) {
                None
            } else {
                placed
                    .iter()
                    .position(|i| i.overlaps(start, finish) && Self::shares_flag(task, i.task))
            };

            let Some(conflict_index) = conflict else {
                explanation.push(format!("placed at {}", start.to_rfc3339()));
                placed.push(ScheduledInstance {
                    task,
                    start,
                    finish,
                    explanation,
                });
                return Ok(true);
            };

            let conflict_task = placed[conflict_index].task;
            let conflict_finish = placed[conflict_index].finish;

            if conflict_task.fixed && has_dependents {
                // Dependency obligation trumps exclusion.
                explanation.push(format!(
                    "accepted over fixed '{}' to satisfy dependents",
                    conflict_task.id
                ));
                placed.push(ScheduledInstance {
                    task,
                    start,
                    finish,
                    explanation,
                });
                return Ok(true);
            }
            if conflict_task.fixed && task.fixed {
                explanation.push(format!(
                    "fixed conflict with fixed '{}', dropped",
                    conflict_task.id
                ));
                return Ok(false);
            }
            if conflict_task.fixed {
                explanation.push(format!(
                    "conflict with fixed '{}', moved to {}",
                    conflict_task.id,
                    conflict_finish.to_rfc3339()
                ));
                start = conflict_finish;
                continue;
            }
            if task.fixed {
                explanation.push(format!("fixed task displaced '{}'", conflict_task.id));
                placed.remove(conflict_index);
                continue;
            }
            if task.priority > conflict_task.priority {
                explanation.push(format!(
                    "displaced lower-priority '{}'",
                    conflict_task.id
                ));
                placed.remove(conflict_index);
                continue;
            }
            if task.priority < conflict_task.priority {
                explanation.push(format!(
                    "yielded to higher-priority '{}', moved to {}",
                    conflict_task.id,
                    conflict_finish.to_rfc3339()
                ));
                start = conflict_finish;
                continue;
            }

            let step = match task.shift {
                ShiftPolicy::By(span) if span > Duration::zero() => span,
                _ => Duration::minutes(1),
            };
            explanation.push(format!(
                "conflict with '{}', shifted forward to {}",
                conflict_task.id,
                (start + step).to_rfc3339()
            ));
            start += step;
        }
    }

    /// Every flag of the candidate (or the synthetic default flag) must have
    /// strictly fewer than `parallel` overlapping placed instances.
    fn acceptable_parallelism(
        &self,
        task: &TaskPattern,
        start: DateTime<Utc>,
        finish: DateTime<Utc>,
        placed: &[ScheduledInstance<'_>],
    ) -> bool {
        let quota = task.parallel as usize;
        for flag in Self::effective_flags(task) {
            let occupied = placed
                .iter()
                .filter(|i| i.overlaps(start, finish) && Self::has_flag(i.task, flag))
                .count();
            if occupied >= quota {
                return false;
            }
        }
        true
    }

    fn effective_flags(task: &TaskPattern) -> Vec<&str> {
        if task.flags.is_empty() {
            vec![DEFAULT_FLAG]
        } else {
            task.flags.iter().map(String::as_str).collect()
        }
    }

    fn has_flag(task: &TaskPattern, flag: &str) -> bool {
        if task.flags.is_empty() {
            flag == DEFAULT_FLAG
        } else {
            task.flags.contains(flag)
        }
    }

    fn shares_flag(a: &TaskPattern, b: &TaskPattern) -> bool {
        Self::effective_flags(a)
            .iter()
            .any(|flag| Self::has_flag(b, flag))
    }
}

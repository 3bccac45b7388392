//! Deterministic schedule construction.
//!
//! This module turns a set of task patterns into a sorted list of concrete
//! placements within a window, honoring dependencies, parallelism quotas,
//! priorities, and deadlines.

mod engine;

pub use engine::{on_in_schedule, ScheduleError, ScheduledInstance, Scheduler};

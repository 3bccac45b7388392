//! virtualdate - pattern-based calendar matching and task scheduling.
//!
//! Two layers: a time-pattern matcher that decides whether a concrete
//! instant matches a recurring description of civil time ("last Saturday of
//! every month between noon and 4pm"), and a deterministic scheduler that
//! turns a set of task patterns, with due/omit rules, durations,
//! dependencies, priorities, parallelism quotas and deadlines, into a sorted
//! list of placements within a window.

pub mod config;
pub mod core;
pub mod export;
pub mod scheduler;

pub use crate::config::{ConfigError, ValidationIssue, YamlLoader, CURRENT_SCHEMA_VERSION};
pub use crate::core::calendar;
pub use crate::core::explain::Explanation;
pub use crate::core::field::{FieldPattern, PatternError};
pub use crate::core::pattern::TimePattern;
pub use crate::core::shift::{ShiftSearch, DEFAULT_MAX_SHIFTS};
pub use crate::core::task::{
    OnOverride, OnResult, Resolution, ShiftPolicy, TaskPattern, TimeRef,
};
pub use crate::export::{export_ical, export_ical_at};
pub use crate::scheduler::{on_in_schedule, ScheduleError, ScheduledInstance, Scheduler};

//! Task patterns: the user-facing scheduled item.
//!
//! A `TaskPattern` combines due and omit time patterns with a shift policy,
//! limits, and scheduling attributes. Its three queries layer on each other:
//! [`TaskPattern::strict_on`] answers "what happens at exactly this time",
//! [`TaskPattern::resolve`] turns a shifted answer into the concrete target
//! instant, and [`TaskPattern::on`] additionally accepts instants that are
//! the shifted resolution of an earlier due time.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use crate::core::field::PatternError;
use crate::core::pattern::TimePattern;
use crate::core::shift::{ShiftSearch, DEFAULT_MAX_SHIFTS};

/// An absolute instant or a recurring pattern constraint.
///
/// Used for `begin`, `end` and `deadline`. The pattern form is a recurrence
/// constraint, not an interval: a pattern `begin` requires the queried time
/// to match it.
#[derive(Clone, Debug)]
pub enum TimeRef {
    At(DateTime<Utc>),
    Matching(TimePattern),
}

/// What to do when a due time falls on an omitted time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShiftPolicy {
    /// No decision was made; the occurrence is treated as not due.
    Undecided,
    /// Refuse the occurrence.
    #[default]
    Never,
    /// Keep the occurrence at its due time despite the omit.
    Always,
    /// Move forward in steps of the span until clear of omits.
    By(Duration),
}

/// Hard override for [`TaskPattern::strict_on`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnOverride {
    /// Force the task on or off everywhere.
    Flag(bool),
    /// Report every query as shifted by the span.
    Span(Duration),
}

/// Answer of [`TaskPattern::strict_on`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnResult {
    /// Not due at the queried time.
    NotDue,
    /// Due but refused: omitted without a workable shift.
    Off,
    /// Due and clear to run.
    On,
    /// Due, omitted, and moved forward by the delta.
    Shifted(Duration),
}

/// Answer of [`TaskPattern::resolve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    NotDue,
    Off,
    On,
    /// The occurrence lands at this concrete instant.
    At(DateTime<Utc>),
}

/// A schedulable task described by time patterns.
#[derive(Clone, Debug)]
pub struct TaskPattern {
    /// Identifier, unique within a scheduler's task set.
    pub id: String,
    /// Earliest admissible time, absolute or as a recurrence constraint.
    pub begin: Option<TimeRef>,
    /// Latest admissible time, absolute or as a recurrence constraint.
    pub end: Option<TimeRef>,
    /// When the task is scheduled to occur. Empty means always due.
    pub due: Vec<TimePattern>,
    /// When the task must not occur. Empty means never omitted.
    pub omit: Vec<TimePattern>,
    /// Policy applied when a due time is omitted.
    pub shift: ShiftPolicy,
    /// Widest total displacement the shift search may take.
    pub max_shift: Option<Duration>,
    /// Step cap for the shift search.
    pub max_shifts: u32,
    /// Hard override bypassing due and omit entirely.
    pub on: Option<OnOverride>,
    /// How long one occurrence runs.
    pub duration: Duration,
    /// Flags grouping tasks for parallelism accounting.
    pub flags: BTreeSet<String>,
    /// How many flag-sharing occurrences may overlap.
    pub parallel: u32,
    /// Conflict-resolution priority, higher wins.
    pub priority: i32,
    /// Fixed tasks do not move to resolve conflicts.
    pub fixed: bool,
    /// Offset between sibling instances when fanning out.
    pub stagger: Option<Duration>,
    /// Occurrences must finish by this time.
    pub deadline: Option<TimeRef>,
    /// Ids of tasks that must be placed before this one.
    pub depends_on: Vec<String>,
}

impl TaskPattern {
    pub fn new(id: impl Into<String>) -> Self {
        TaskPattern {
            id: id.into(),
            begin: None,
            end: None,
            due: Vec::new(),
            omit: Vec::new(),
            shift: ShiftPolicy::default(),
            max_shift: None,
            max_shifts: DEFAULT_MAX_SHIFTS,
            on: None,
            duration: Duration::zero(),
            flags: BTreeSet::new(),
            parallel: 1,
            priority: 0,
            fixed: false,
            stagger: None,
            deadline: None,
            depends_on: Vec::new(),
        }
    }

    pub fn with_due(mut self, pattern: TimePattern) -> Self {
        self.due.push(pattern);
        self
    }

    pub fn with_omit(mut self, pattern: TimePattern) -> Self {
        self.omit.push(pattern);
        self
    }

    pub fn with_shift(mut self, shift: ShiftPolicy) -> Self {
        self.shift = shift;
        self
    }

    pub fn with_max_shift(mut self, max_shift: Duration) -> Self {
        self.max_shift = Some(max_shift);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    pub fn with_parallel(mut self, parallel: u32) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_fixed(mut self, fixed: bool) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = Some(stagger);
        self
    }

    pub fn with_deadline(mut self, deadline: TimeRef) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    /// Whether any due pattern covers `t`.
    ///
    /// Date and time halves are tested across the whole list, so one entry
    /// may satisfy the date while another satisfies the time. An empty list
    /// is always due.
    pub fn due_matches(&self, t: DateTime<Utc>) -> bool {
        if self.due.is_empty() {
            return true;
        }
        self.due.iter().any(|p| p.matches_date(t)) && self.due.iter().any(|p| p.matches_time(t))
    }

    /// Whether any omit pattern covers `t`. An empty list never omits.
    pub fn omit_matches(&self, t: DateTime<Utc>) -> bool {
        if self.omit.is_empty() {
            return false;
        }
        self.omit.iter().any(|p| p.matches_date(t)) && self.omit.iter().any(|p| p.matches_time(t))
    }

    fn within_bounds(&self, t: DateTime<Utc>) -> bool {
        match &self.begin {
            Some(TimeRef::At(begin)) if t < *begin => return false,
            Some(TimeRef::Matching(p)) if !p.matches(t) => return false,
            _ => {}
        }
        match &self.end {
            Some(TimeRef::At(end)) if t > *end => return false,
            Some(TimeRef::Matching(p)) if !p.matches(t) => return false,
            _ => {}
        }
        true
    }

    fn shift_search(&self, span: Duration) -> ShiftSearch {
        ShiftSearch::new(span, self.max_shift, self.max_shifts)
    }

    /// What happens at exactly `t`.
    ///
    /// `NotDue` when the task is not due there (or outside begin/end),
    /// `On` when due and clear, `Off` when due but refused, and
    /// `Shifted(delta)` when the shift policy moved the occurrence forward.
    pub fn strict_on(&self, t: DateTime<Utc>) -> OnResult {
        if let Some(over) = self.on {
            return match over {
                OnOverride::Flag(true) => OnResult::On,
                OnOverride::Flag(false) => OnResult::Off,
                OnOverride::Span(delta) => OnResult::Shifted(delta),
            };
        }
        if !self.within_bounds(t) || !self.due_matches(t) {
            return OnResult::NotDue;
        }
        if !self.omit_matches(t) {
            return OnResult::On;
        }
        match self.shift {
            ShiftPolicy::Undecided => OnResult::NotDue,
            ShiftPolicy::Never => OnResult::Off,
            ShiftPolicy::Always => OnResult::On,
            ShiftPolicy::By(span) => match self
                .shift_search(span)
                .forward_shift(t, |current| self.omit_matches(current))
            {
                Some(delta) => OnResult::Shifted(delta),
                None => OnResult::Off,
            },
        }
    }

    /// [`TaskPattern::strict_on`] for a pattern query, materialized against
    /// `hint` first.
    pub fn strict_on_pattern(
        &self,
        pattern: &TimePattern,
        hint: DateTime<Utc>,
    ) -> Result<OnResult, PatternError> {
        Ok(self.strict_on(pattern.materialize(hint)?))
    }

    /// Whether `t` is effectively a placement: either due and clear, or the
    /// shifted resolution of an earlier due time.
    pub fn on(&self, t: DateTime<Utc>) -> bool {
        if self.strict_on(t) == OnResult::On {
            return true;
        }
        if let ShiftPolicy::By(span) = self.shift {
            if !span.is_zero() {
                return self
                    .shift_search(span)
                    .is_reachable_from_base(t, |base| match self.strict_on(base) {
                        OnResult::Shifted(delta) => Some(delta),
                        // An On at the base stays at the base; it does not
                        // make the target reachable.
                        _ => None,
                    });
            }
        }
        false
    }

    /// [`TaskPattern::strict_on`] with shifted answers resolved to their
    /// concrete instant.
    pub fn resolve(&self, t: DateTime<Utc>) -> Resolution {
        match self.strict_on(t) {
            OnResult::Shifted(delta) => Resolution::At(t + delta),
            OnResult::On => Resolution::On,
            OnResult::Off => Resolution::Off,
            OnResult::NotDue => Resolution::NotDue,
        }
    }
}

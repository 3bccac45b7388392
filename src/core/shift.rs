//! Bounded shift search.
//!
//! Two deterministic walks share one parameter set: the forward search that
//! moves a due occurrence past an omitted region, and the inverse walk that
//! decides whether a target instant is the shifted resolution of some
//! earlier base.

use chrono::{DateTime, Duration, Utc};

/// Default cap on the number of shift steps taken before giving up.
pub const DEFAULT_MAX_SHIFTS: u32 = 1500;

/// Parameters of a bounded shift search.
#[derive(Clone, Debug)]
pub struct ShiftSearch {
    /// Step taken on every iteration. Zero makes every search fail.
    pub shift: Duration,
    /// Widest distance from the search origin, when set.
    pub max_shift: Option<Duration>,
    /// Iteration cap.
    pub max_shifts: u32,
}

impl ShiftSearch {
    pub fn new(shift: Duration, max_shift: Option<Duration>, max_shifts: u32) -> Self {
        Self {
            shift,
            max_shift,
            max_shifts,
        }
    }

    /// Step forward from `base` until `omitted` stops holding.
    ///
    /// Returns the total displacement on success, `None` once the step
    /// count or the `max_shift` window is exhausted.
    pub fn forward_shift(
        &self,
        base: DateTime<Utc>,
        mut omitted: impl FnMut(DateTime<Utc>) -> bool,
    ) -> Option<Duration> {
        if self.shift.is_zero() {
            return None;
        }
        let mut current = base;
        for _ in 0..self.max_shifts {
            current += self.shift;
            if let Some(window) = self.max_shift {
                if (current - base).abs() > window {
                    return None;
                }
            }
            if !omitted(current) {
                return Some(current - base);
            }
        }
        None
    }

    /// Decide whether `target` is reachable as `base + delta` for some base
    /// at `target - k * shift` whose `resolver` yields `delta`.
    ///
    /// The walk stops once `k` exceeds the step cap or the base leaves the
    /// `max_shift` window measured against `target`.
    pub fn is_reachable_from_base(
        &self,
        target: DateTime<Utc>,
        mut resolver: impl FnMut(DateTime<Utc>) -> Option<Duration>,
    ) -> bool {
        if self.shift.is_zero() {
            return false;
        }
        for k in 1..=self.max_shifts {
            let base = target - self.shift * (k as i32);
            if let Some(window) = self.max_shift {
                if (target - base).abs() > window {
                    return false;
                }
            }
            if let Some(delta) = resolver(base) {
                if base + delta == target {
                    return true;
                }
            }
        }
        false
    }
}

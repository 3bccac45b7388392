//! Field patterns: the atomic value in every pattern slot.
//!
//! A `FieldPattern` describes the admissible values of a single civil-time
//! field (month, day, hour, ...). Negative integers index from the end of the
//! field's range and are resolved lazily inside [`FieldPattern::matches`],
//! because the wrap anchor for slots like `day` depends on the candidate
//! being matched.
//!
//! Patterns round-trip through a scalar grammar (`FromStr` / `Display`):
//! `nil`, a bare integer, `1,2,3`, `10..20` (inclusive), `10...20`
//! (exclusive), either range form with a `/2` step suffix, `true` / `false`,
//! and the `->` sentinel standing in for a predicate.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

/// Errors produced while parsing or materializing patterns.
#[derive(Debug, Error)]
pub enum PatternError {
    /// Malformed pattern scalar, or a zero/negative step.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// Materialization could not reconcile the pattern's constraints.
    #[error("unreconcilable pattern: {0}")]
    Unreconcilable(String),
}

/// Admissible values of one pattern slot.
#[derive(Clone, Default)]
pub enum FieldPattern {
    /// Matches any value.
    #[default]
    Unset,

    /// Matches everything or nothing, unconditionally.
    Always(bool),

    /// Matches one integer; negative values index from the slot maximum.
    Exact(i32),

    /// Matches any of the listed integers.
    List(Vec<i32>),

    /// Matches an integer range; endpoints wrap like `Exact`.
    Range { lo: i32, hi: i32, inclusive: bool },

    /// Matches `lo + k * step` for `k >= 0` while the value stays `<= hi`.
    Stepped { lo: i32, hi: i32, step: i32 },

    /// Matches when the callback returns true. Not serializable.
    Predicate(Arc<dyn Fn(i32) -> bool + Send + Sync>),
}

impl FieldPattern {
    /// Construct an inclusive or exclusive range, validating `lo <= hi`.
    pub fn range(lo: i32, hi: i32, inclusive: bool) -> Result<Self, PatternError> {
        if lo > hi {
            return Err(PatternError::InvalidPattern(format!(
                "range start {} exceeds end {}",
                lo, hi
            )));
        }
        Ok(FieldPattern::Range { lo, hi, inclusive })
    }

    /// Construct a stepped range, validating `lo <= hi` and `step > 0`.
    pub fn stepped(lo: i32, hi: i32, step: i32) -> Result<Self, PatternError> {
        if step <= 0 {
            return Err(PatternError::InvalidPattern(format!(
                "step must be positive, got {}",
                step
            )));
        }
        if lo > hi {
            return Err(PatternError::InvalidPattern(format!(
                "range start {} exceeds end {}",
                lo, hi
            )));
        }
        Ok(FieldPattern::Stepped { lo, hi, step })
    }

    /// Wrap a predicate callback.
    pub fn predicate(f: impl Fn(i32) -> bool + Send + Sync + 'static) -> Self {
        FieldPattern::Predicate(Arc::new(f))
    }

    /// True for the variant that matches anything.
    pub fn is_unset(&self) -> bool {
        matches!(self, FieldPattern::Unset)
    }

    /// True when the pattern pins a single value.
    pub fn is_exact(&self) -> bool {
        matches!(self, FieldPattern::Exact(_))
    }

    fn wrap(n: i32, max: Option<i32>) -> i32 {
        match max {
            Some(m) if n < 0 => m + n + 1,
            _ => n,
        }
    }

    /// Decide whether `value` matches, wrapping negative integers against
    /// `max` when it is known.
    pub fn matches(&self, value: i32, max: Option<i32>) -> bool {
        match self {
            FieldPattern::Unset => true,
            FieldPattern::Always(b) => *b,
            FieldPattern::Exact(n) => Self::wrap(*n, max) == value,
            FieldPattern::List(items) => items.iter().any(|n| Self::wrap(*n, max) == value),
            FieldPattern::Range { lo, hi, inclusive } => {
                let lo = Self::wrap(*lo, max);
                let hi = Self::wrap(*hi, max);
                if *inclusive {
                    lo <= value && value <= hi
                } else {
                    lo <= value && value < hi
                }
            }
            FieldPattern::Stepped { lo, hi, step } => {
                let lo = Self::wrap(*lo, max);
                let hi = Self::wrap(*hi, max);
                value >= lo && value <= hi && (value - lo) % step == 0
            }
            FieldPattern::Predicate(f) => f(value),
        }
    }

    /// Enumerate the pattern into `Exact` members, ascending.
    ///
    /// `Unset`, `Always` and `Predicate` cannot be enumerated and expand to
    /// themselves.
    pub fn expand(&self) -> Vec<FieldPattern> {
        match self {
            FieldPattern::Unset | FieldPattern::Always(_) | FieldPattern::Predicate(_) => {
                vec![self.clone()]
            }
            FieldPattern::Exact(n) => vec![FieldPattern::Exact(*n)],
            FieldPattern::List(items) => {
                let mut sorted = items.clone();
                sorted.sort_unstable();
                sorted.dedup();
                sorted.into_iter().map(FieldPattern::Exact).collect()
            }
            FieldPattern::Range { lo, hi, inclusive } => {
                let hi = if *inclusive { *hi } else { *hi - 1 };
                (*lo..=hi).map(FieldPattern::Exact).collect()
            }
            FieldPattern::Stepped { lo, hi, step } => (*lo..=*hi)
                .step_by(*step as usize)
                .map(FieldPattern::Exact)
                .collect(),
        }
    }

    /// Pick a concrete value for this pattern.
    ///
    /// Returns `default` when it matches (or always, for `Unset`/`Always`,
    /// or when `strict` is off); otherwise the smallest matching value after
    /// wrap.
    pub fn materialize(&self, default: i32, max: Option<i32>, strict: bool) -> i32 {
        match self {
            FieldPattern::Unset | FieldPattern::Always(_) => return default,
            _ => {}
        }
        if !strict || self.matches(default, max) {
            return default;
        }
        match self {
            FieldPattern::Exact(n) => Self::wrap(*n, max),
            FieldPattern::List(items) => items
                .iter()
                .map(|n| Self::wrap(*n, max))
                .min()
                .unwrap_or(default),
            FieldPattern::Range { lo, .. } | FieldPattern::Stepped { lo, .. } => {
                Self::wrap(*lo, max)
            }
            FieldPattern::Predicate(f) => (0..=max.unwrap_or(9999))
                .find(|v| f(*v))
                .unwrap_or(default),
            FieldPattern::Unset | FieldPattern::Always(_) => default,
        }
    }
}

impl fmt::Debug for FieldPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPattern::Unset => f.write_str("Unset"),
            FieldPattern::Always(b) => f.debug_tuple("Always").field(b).finish(),
            FieldPattern::Exact(n) => f.debug_tuple("Exact").field(n).finish(),
            FieldPattern::List(items) => f.debug_tuple("List").field(items).finish(),
            FieldPattern::Range { lo, hi, inclusive } => f
                .debug_struct("Range")
                .field("lo", lo)
                .field("hi", hi)
                .field("inclusive", inclusive)
                .finish(),
            FieldPattern::Stepped { lo, hi, step } => f
                .debug_struct("Stepped")
                .field("lo", lo)
                .field("hi", hi)
                .field("step", step)
                .finish(),
            FieldPattern::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl PartialEq for FieldPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldPattern::Unset, FieldPattern::Unset) => true,
            (FieldPattern::Always(a), FieldPattern::Always(b)) => a == b,
            (FieldPattern::Exact(a), FieldPattern::Exact(b)) => a == b,
            (FieldPattern::List(a), FieldPattern::List(b)) => a == b,
            (
                FieldPattern::Range {
                    lo: a,
                    hi: b,
                    inclusive: c,
                },
                FieldPattern::Range {
                    lo: x,
                    hi: y,
                    inclusive: z,
                },
            ) => a == x && b == y && c == z,
            (
                FieldPattern::Stepped {
                    lo: a,
                    hi: b,
                    step: c,
                },
                FieldPattern::Stepped {
                    lo: x,
                    hi: y,
                    step: z,
                },
            ) => a == x && b == y && c == z,
            (FieldPattern::Predicate(a), FieldPattern::Predicate(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for FieldPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPattern::Unset => f.write_str("nil"),
            FieldPattern::Always(b) => write!(f, "{}", b),
            FieldPattern::Exact(n) => write!(f, "{}", n),
            FieldPattern::List(items) => {
                let text: Vec<String> = items.iter().map(|n| n.to_string()).collect();
                f.write_str(&text.join(","))
            }
            FieldPattern::Range { lo, hi, inclusive } => {
                if *inclusive {
                    write!(f, "{}..{}", lo, hi)
                } else {
                    write!(f, "{}...{}", lo, hi)
                }
            }
            FieldPattern::Stepped { lo, hi, step } => write!(f, "{}..{}/{}", lo, hi, step),
            FieldPattern::Predicate(_) => f.write_str("->"),
        }
    }
}

impl FromStr for FieldPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "" | "nil" | "~" => return Ok(FieldPattern::Unset),
            "true" => return Ok(FieldPattern::Always(true)),
            "false" => return Ok(FieldPattern::Always(false)),
            _ => {}
        }
        if s.starts_with("->") {
            tracing::warn!(
                scalar = s,
                "predicate pattern loaded as an always-true placeholder"
            );
            return Ok(FieldPattern::Always(true));
        }

        let (body, step) = match s.split_once('/') {
            Some((body, step_str)) => {
                let step: i32 = step_str.trim().parse().map_err(|_| {
                    PatternError::InvalidPattern(format!("bad step in '{}'", s))
                })?;
                (body.trim(), Some(step))
            }
            None => (s, None),
        };

        if let Some((lo, hi, inclusive)) = split_range(body)? {
            return match step {
                // An exclusive stepped range walks up to, not through, its end.
                Some(step) => FieldPattern::stepped(lo, if inclusive { hi } else { hi - 1 }, step),
                None => FieldPattern::range(lo, hi, inclusive),
            };
        }
        if step.is_some() {
            return Err(PatternError::InvalidPattern(format!(
                "step suffix requires a range: '{}'",
                s
            )));
        }

        if body.contains(',') {
            let items: Result<Vec<i32>, _> = body
                .split(',')
                .map(|part| part.trim().parse::<i32>())
                .collect();
            return items
                .map(FieldPattern::List)
                .map_err(|_| PatternError::InvalidPattern(format!("bad list '{}'", s)));
        }

        body.parse::<i32>()
            .map(FieldPattern::Exact)
            .map_err(|_| PatternError::InvalidPattern(format!("unrecognized scalar '{}'", s)))
    }
}

/// Split `A..B` / `A...B` into endpoints, or return `None` for non-ranges.
fn split_range(s: &str) -> Result<Option<(i32, i32, bool)>, PatternError> {
    let (lo_str, hi_str, inclusive) = if let Some(i) = s.find("...") {
        (&s[..i], &s[i + 3..], false)
    } else if let Some(i) = s.find("..") {
        (&s[..i], &s[i + 2..], true)
    } else {
        return Ok(None);
    };
    let lo: i32 = lo_str
        .trim()
        .parse()
        .map_err(|_| PatternError::InvalidPattern(format!("bad range start in '{}'", s)))?;
    let hi: i32 = hi_str
        .trim()
        .parse()
        .map_err(|_| PatternError::InvalidPattern(format!("bad range end in '{}'", s)))?;
    Ok(Some((lo, hi, inclusive)))
}

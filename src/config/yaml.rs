//! YAML persistence for task sets.
//!
//! The on-disk format is a mapping with `schema_version` and `tasks`; a
//! legacy document consisting of a bare task sequence at the root is still
//! readable. Pattern slots use the scalar grammar of
//! [`FieldPattern`](crate::core::field::FieldPattern), so a due entry looks
//! like:
//!
//! ```yaml
//! schema_version: 2
//! tasks:
//!   - id: report
//!     due:
//!       - month: 3
//!         day: 10..20/2
//!         hour: 9
//!     duration: 3600
//! ```
//!
//! Validation does not short-circuit: every problem is reported with the
//! line and column of the offending node.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::error::{ConfigError, ValidationIssue};
use crate::config::locate::SourceMap;
use crate::core::field::FieldPattern;
use crate::core::pattern::TimePattern;
use crate::core::shift::DEFAULT_MAX_SHIFTS;
use crate::core::task::{OnOverride, ShiftPolicy, TaskPattern, TimeRef};

/// Version written by [`YamlLoader::to_yaml`]; newer documents are refused.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Top-level document shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentConfig {
    #[serde(default = "default_schema_version")]
    schema_version: u64,
    #[serde(default)]
    tasks: Vec<TaskConfig>,
}

fn default_schema_version() -> u64 {
    CURRENT_SCHEMA_VERSION as u64
}

/// One task mapping as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin: Option<TimeRefConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<TimeRefConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub due: Vec<PatternConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub omit: Vec<PatternConfig>,
    /// Absent means no shifting; an explicit null leaves the omit decision
    /// open.
    #[serde(
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub shift: Option<Option<ShiftConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_shift: Option<i64>,
    #[serde(skip_serializing_if = "is_default_max_shifts")]
    pub max_shifts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<OnConfig>,
    /// Seconds; zero-length occurrences are markers on the timeline.
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub duration: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(skip_serializing_if = "is_one")]
    pub parallel: u32,
    #[serde(skip_serializing_if = "is_zero_i32")]
    pub priority: i32,
    #[serde(skip_serializing_if = "is_false")]
    pub fixed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stagger: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<TimeRefConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        TaskConfig {
            id: String::new(),
            begin: None,
            end: None,
            due: Vec::new(),
            omit: Vec::new(),
            shift: None,
            max_shift: None,
            max_shifts: DEFAULT_MAX_SHIFTS,
            on: None,
            duration: 0,
            flags: Vec::new(),
            parallel: 1,
            priority: 0,
            fixed: false,
            stagger: None,
            deadline: None,
            depends_on: Vec::new(),
        }
    }
}

fn is_default_max_shifts(v: &u32) -> bool {
    *v == DEFAULT_MAX_SHIFTS
}

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

fn is_one(v: &u32) -> bool {
    *v == 1
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Distinguish an absent key (outer `None`) from an explicit null
/// (`Some(None)`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// An RFC 3339 instant or a pattern mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeRefConfig {
    Instant(DateTime<Utc>),
    Pattern(PatternConfig),
}

/// `shift`: bool or integer seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShiftConfig {
    Flag(bool),
    Seconds(i64),
}

/// `on` override: bool or integer seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OnConfig {
    Flag(bool),
    Seconds(i64),
}

/// A pattern mapping: slot name to pattern scalar, plus a location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<FieldConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<FieldConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<FieldConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week: Option<FieldConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<FieldConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_year: Option<FieldConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<FieldConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute: Option<FieldConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second: Option<FieldConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub millisecond: Option<FieldConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nanosecond: Option<FieldConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// One pattern scalar: a bool, an integer, or grammar text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldConfig {
    Flag(bool),
    Int(i32),
    Text(String),
}

/// Loads and saves task documents.
pub struct YamlLoader;

impl YamlLoader {
    /// Load tasks from a file.
    pub fn load_tasks(path: impl AsRef<Path>) -> Result<Vec<TaskPattern>, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::parse_tasks(&source)
    }

    /// Parse tasks from a YAML string, accumulating validation issues.
    pub fn parse_tasks(source: &str) -> Result<Vec<TaskPattern>, ConfigError> {
        let map = SourceMap::parse(source);
        let configs = if Self::is_legacy_sequence(source) {
            tracing::warn!("loading legacy bare-sequence task document");
            serde_yaml::from_str::<Vec<TaskConfig>>(source)?
        } else {
            let doc: DocumentConfig = serde_yaml::from_str(source)?;
            if doc.schema_version > CURRENT_SCHEMA_VERSION as u64 {
                return Err(ConfigError::SchemaVersion {
                    found: doc.schema_version,
                    current: CURRENT_SCHEMA_VERSION,
                });
            }
            doc.tasks
        };
        Self::build_tasks(&configs, &map)
    }

    /// Save tasks to a file in the current schema version.
    pub fn save_tasks(path: impl AsRef<Path>, tasks: &[TaskPattern]) -> Result<(), ConfigError> {
        std::fs::write(path, Self::to_yaml(tasks)?)?;
        Ok(())
    }

    /// Render tasks as a schema-versioned YAML document.
    pub fn to_yaml(tasks: &[TaskPattern]) -> Result<String, ConfigError> {
        let doc = DocumentConfig {
            schema_version: CURRENT_SCHEMA_VERSION as u64,
            tasks: tasks.iter().map(TaskConfig::from_task).collect(),
        };
        Ok(serde_yaml::to_string(&doc)?)
    }

    fn is_legacy_sequence(source: &str) -> bool {
        source
            .lines()
            .map(str::trim_start)
            .find(|line| !line.is_empty() && !line.starts_with('#'))
            .is_some_and(|line| line.starts_with('-'))
    }

    fn build_tasks(
        configs: &[TaskConfig],
        map: &SourceMap,
    ) -> Result<Vec<TaskPattern>, ConfigError> {
        let mut issues = Vec::new();
        let mut tasks = Vec::new();

        let mut seen = BTreeSet::new();
        for (index, config) in configs.iter().enumerate() {
            if config.id.is_empty() {
                issues.push(ValidationIssue::new(map.task(index), "task is missing an id"));
            } else if !seen.insert(config.id.as_str()) {
                issues.push(ValidationIssue::new(
                    map.field(index, "id"),
                    format!("duplicate task id '{}'", config.id),
                ));
            }
        }

        let known: BTreeSet<&str> = configs.iter().map(|c| c.id.as_str()).collect();
        for (index, config) in configs.iter().enumerate() {
            for dep_id in &config.depends_on {
                if !known.contains(dep_id.as_str()) {
                    issues.push(ValidationIssue::new(
                        map.field(index, "depends_on"),
                        format!("'{}' depends on unknown task '{}'", config.id, dep_id),
                    ));
                }
            }
            tasks.push(Self::build_task(config, index, map, &mut issues));
        }

        if issues.is_empty() {
            Ok(tasks)
        } else {
            Err(ConfigError::Validation(issues))
        }
    }

    fn build_task(
        config: &TaskConfig,
        index: usize,
        map: &SourceMap,
        issues: &mut Vec<ValidationIssue>,
    ) -> TaskPattern {
        let mut task = TaskPattern::new(config.id.clone());

        task.begin = Self::build_time_ref(&config.begin, index, "begin", map, issues);
        task.end = Self::build_time_ref(&config.end, index, "end", map, issues);
        task.deadline = Self::build_time_ref(&config.deadline, index, "deadline", map, issues);

        for pattern in &config.due {
            if let Some(p) = Self::build_pattern(pattern, index, "due", map, issues) {
                task.due.push(p);
            }
        }
        for pattern in &config.omit {
            if let Some(p) = Self::build_pattern(pattern, index, "omit", map, issues) {
                task.omit.push(p);
            }
        }

        task.shift = match config.shift {
            None | Some(Some(ShiftConfig::Flag(false))) => ShiftPolicy::Never,
            Some(None) => ShiftPolicy::Undecided,
            Some(Some(ShiftConfig::Flag(true))) => ShiftPolicy::Always,
            Some(Some(ShiftConfig::Seconds(seconds))) => {
                ShiftPolicy::By(Duration::seconds(seconds))
            }
        };

        task.max_shift = match config.max_shift {
            Some(seconds) if seconds < 0 => {
                issues.push(ValidationIssue::new(
                    map.field(index, "max_shift"),
                    "max_shift must not be negative",
                ));
                None
            }
            Some(seconds) => Some(Duration::seconds(seconds)),
            None => None,
        };
        task.max_shifts = config.max_shifts;

        task.on = config.on.map(|on| match on {
            OnConfig::Flag(flag) => OnOverride::Flag(flag),
            OnConfig::Seconds(seconds) => OnOverride::Span(Duration::seconds(seconds)),
        });

        if config.duration < 0 {
            issues.push(ValidationIssue::new(
                map.field(index, "duration"),
                "duration must not be negative",
            ));
        } else {
            task.duration = Duration::seconds(config.duration);
        }

        task.flags = config.flags.iter().cloned().collect();

        if config.parallel < 1 {
            issues.push(ValidationIssue::new(
                map.field(index, "parallel"),
                "parallel must be at least 1",
            ));
        } else {
            task.parallel = config.parallel;
        }

        task.priority = config.priority;
        task.fixed = config.fixed;

        task.stagger = match config.stagger {
            Some(seconds) if seconds <= 0 => {
                issues.push(ValidationIssue::new(
                    map.field(index, "stagger"),
                    "stagger must be positive",
                ));
                None
            }
            Some(seconds) => Some(Duration::seconds(seconds)),
            None => None,
        };

        task.depends_on = config.depends_on.clone();
        task
    }

    fn build_time_ref(
        config: &Option<TimeRefConfig>,
        index: usize,
        key: &str,
        map: &SourceMap,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<TimeRef> {
        match config {
            None => None,
            Some(TimeRefConfig::Instant(at)) => Some(TimeRef::At(*at)),
            Some(TimeRefConfig::Pattern(pattern)) => {
                Self::build_pattern(pattern, index, key, map, issues).map(TimeRef::Matching)
            }
        }
    }

    fn build_pattern(
        config: &PatternConfig,
        index: usize,
        key: &str,
        map: &SourceMap,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<TimePattern> {
        let position = map.field(index, key);
        let mut ok = true;

        let location = match &config.location {
            None => None,
            Some(name) => match name.parse::<Tz>() {
                Ok(tz) => Some(tz),
                Err(_) => {
                    issues.push(ValidationIssue::new(
                        position,
                        format!("{}: unknown location '{}'", key, name),
                    ));
                    ok = false;
                    None
                }
            },
        };

        let mut slot = |field: &Option<FieldConfig>, name: &str| match Self::build_field(field) {
            Ok(pattern) => pattern,
            Err(err) => {
                issues.push(ValidationIssue::new(
                    position,
                    format!("{}.{}: {}", key, name, err),
                ));
                ok = false;
                FieldPattern::Unset
            }
        };

        let pattern = TimePattern {
            year: slot(&config.year, "year"),
            month: slot(&config.month, "month"),
            day: slot(&config.day, "day"),
            week: slot(&config.week, "week"),
            day_of_week: slot(&config.day_of_week, "day_of_week"),
            day_of_year: slot(&config.day_of_year, "day_of_year"),
            hour: slot(&config.hour, "hour"),
            minute: slot(&config.minute, "minute"),
            second: slot(&config.second, "second"),
            millisecond: slot(&config.millisecond, "millisecond"),
            nanosecond: slot(&config.nanosecond, "nanosecond"),
            location,
        };
        ok.then_some(pattern)
    }

    fn build_field(config: &Option<FieldConfig>) -> Result<FieldPattern, crate::core::field::PatternError> {
        match config {
            None => Ok(FieldPattern::Unset),
            Some(FieldConfig::Flag(flag)) => Ok(FieldPattern::Always(*flag)),
            Some(FieldConfig::Int(value)) => Ok(FieldPattern::Exact(*value)),
            Some(FieldConfig::Text(text)) => text.parse(),
        }
    }
}

impl TaskConfig {
    /// Snapshot a task back into its persisted shape.
    pub fn from_task(task: &TaskPattern) -> Self {
        TaskConfig {
            id: task.id.clone(),
            begin: task.begin.as_ref().map(TimeRefConfig::from_time_ref),
            end: task.end.as_ref().map(TimeRefConfig::from_time_ref),
            due: task.due.iter().map(PatternConfig::from_pattern).collect(),
            omit: task.omit.iter().map(PatternConfig::from_pattern).collect(),
            shift: match task.shift {
                ShiftPolicy::Never => None,
                ShiftPolicy::Undecided => Some(None),
                ShiftPolicy::Always => Some(Some(ShiftConfig::Flag(true))),
                ShiftPolicy::By(span) => Some(Some(ShiftConfig::Seconds(span.num_seconds()))),
            },
            max_shift: task.max_shift.map(|d| d.num_seconds()),
            max_shifts: task.max_shifts,
            on: task.on.map(|over| match over {
                OnOverride::Flag(flag) => OnConfig::Flag(flag),
                OnOverride::Span(span) => OnConfig::Seconds(span.num_seconds()),
            }),
            duration: task.duration.num_seconds(),
            flags: task.flags.iter().cloned().collect(),
            parallel: task.parallel,
            priority: task.priority,
            fixed: task.fixed,
            stagger: task.stagger.map(|d| d.num_seconds()),
            deadline: task.deadline.as_ref().map(TimeRefConfig::from_time_ref),
            depends_on: task.depends_on.clone(),
        }
    }
}

impl TimeRefConfig {
    fn from_time_ref(time_ref: &TimeRef) -> Self {
        match time_ref {
            TimeRef::At(at) => TimeRefConfig::Instant(*at),
            TimeRef::Matching(pattern) => {
                TimeRefConfig::Pattern(PatternConfig::from_pattern(pattern))
            }
        }
    }
}

impl PatternConfig {
    fn from_pattern(pattern: &TimePattern) -> Self {
        PatternConfig {
            year: field_config(&pattern.year),
            month: field_config(&pattern.month),
            day: field_config(&pattern.day),
            week: field_config(&pattern.week),
            day_of_week: field_config(&pattern.day_of_week),
            day_of_year: field_config(&pattern.day_of_year),
            hour: field_config(&pattern.hour),
            minute: field_config(&pattern.minute),
            second: field_config(&pattern.second),
            millisecond: field_config(&pattern.millisecond),
            nanosecond: field_config(&pattern.nanosecond),
            location: pattern.location.map(|tz| tz.name().to_string()),
        }
    }
}

fn field_config(pattern: &FieldPattern) -> Option<FieldConfig> {
    match pattern {
        FieldPattern::Unset => None,
        FieldPattern::Always(flag) => Some(FieldConfig::Flag(*flag)),
        FieldPattern::Exact(value) => Some(FieldConfig::Int(*value)),
        // Predicates are opaque; the sentinel loads back as always-true.
        FieldPattern::Predicate(_) => Some(FieldConfig::Text("->".to_string())),
        other => Some(FieldConfig::Text(other.to_string())),
    }
}

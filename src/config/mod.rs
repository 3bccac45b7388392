//! Schema-versioned YAML persistence.
//!
//! Task documents are a mapping with `schema_version` (currently 2) and a
//! `tasks` sequence; legacy documents carrying a bare sequence at the root
//! load read-only. Validation accumulates every problem with its line and
//! column instead of stopping at the first.

mod error;
mod locate;
mod yaml;

pub use error::{ConfigError, ValidationIssue};
pub use locate::SourceMap;
pub use yaml::{
    FieldConfig, OnConfig, PatternConfig, ShiftConfig, TaskConfig, TimeRefConfig, YamlLoader,
    CURRENT_SCHEMA_VERSION,
};

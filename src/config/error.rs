//! Configuration error types.

use std::fmt;

use thiserror::Error;

/// A single validation problem located in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// 1-based line of the offending node.
    pub line: usize,
    /// 1-based column of the offending node.
    pub column: usize,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(location: (usize, usize), message: impl Into<String>) -> Self {
        ValidationIssue {
            line: location.0,
            column: location.1,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}: {}", self.line, self.column, self.message)
    }
}

/// Errors that can occur when loading or saving task documents.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or write the file.
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not well-formed YAML or has the wrong shape.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document declares a schema newer than this build understands.
    #[error("unsupported schema_version {found} (current is {current})")]
    SchemaVersion { found: u64, current: u32 },

    /// One or more validation problems; none are dropped.
    #[error("validation failed with {} error(s):\n{}", .0.len(), format_issues(.0))]
    Validation(Vec<ValidationIssue>),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ValidationIssue::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

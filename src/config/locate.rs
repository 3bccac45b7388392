//! Best-effort source positions for validation messages.
//!
//! serde gives us well-typed task configs but no per-node spans, so semantic
//! validation locates its messages through a line scan of the raw document:
//! one span per task list item, plus the top-level field keys inside it.
//! Lookups that find nothing fall back to the document start rather than
//! failing, since positions only decorate error messages.

/// Line/column index over the task entries of a YAML document.
#[derive(Debug, Default)]
pub struct SourceMap {
    tasks: Vec<TaskSpan>,
}

#[derive(Debug)]
struct TaskSpan {
    line: usize,
    column: usize,
    fields: Vec<(String, usize, usize)>,
}

impl SourceMap {
    /// Scan `source` for task list items and their field keys.
    ///
    /// Handles both the schema-versioned layout (items under a top-level
    /// `tasks:` key) and the legacy bare-sequence layout.
    pub fn parse(source: &str) -> Self {
        let mut tasks: Vec<TaskSpan> = Vec::new();
        let mut in_tasks = is_bare_sequence(source);
        let mut item_indent: Option<usize> = None;

        for (number, raw) in source.lines().enumerate() {
            let line = number + 1;
            let trimmed = raw.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let indent = raw.len() - trimmed.len();

            if !in_tasks {
                if indent == 0 && trimmed.starts_with("tasks:") {
                    in_tasks = true;
                }
                continue;
            }

            // Another top-level key ends the task list.
            if indent == 0 && !trimmed.starts_with('-') && trimmed.contains(':') {
                in_tasks = false;
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix('-') {
                let accepted = match item_indent {
                    Some(known) => indent == known,
                    None => {
                        item_indent = Some(indent);
                        true
                    }
                };
                if accepted {
                    let mut span = TaskSpan {
                        line,
                        column: indent + 1,
                        fields: Vec::new(),
                    };
                    // Inline first field: "- id: backup"
                    let rest = rest.trim_start();
                    if let Some((key, _)) = split_key(rest) {
                        let column = raw.len() - rest.len() + 1;
                        span.fields.push((key.to_string(), line, column));
                    }
                    tasks.push(span);
                    continue;
                }
            }

            // A field key of the current task. Only record the shallowest
            // depth seen, so nested mapping keys (pattern slots) are skipped.
            if let (Some(task), Some(item)) = (tasks.last_mut(), item_indent) {
                if indent > item {
                    if let Some((key, _)) = split_key(trimmed) {
                        let depth_known = task
                            .fields
                            .first()
                            .map(|(_, _, col)| *col)
                            .unwrap_or(indent + 1);
                        if indent + 1 <= depth_known {
                            task.fields.push((key.to_string(), line, indent + 1));
                        }
                    }
                }
            }
        }

        SourceMap { tasks }
    }

    /// Position of the task list item with the given index.
    pub fn task(&self, index: usize) -> (usize, usize) {
        self.tasks
            .get(index)
            .map(|span| (span.line, span.column))
            .unwrap_or((1, 1))
    }

    /// Position of a field key within a task, falling back to the item.
    pub fn field(&self, index: usize, key: &str) -> (usize, usize) {
        match self.tasks.get(index) {
            Some(span) => span
                .fields
                .iter()
                .find(|(name, _, _)| name == key)
                .map(|(_, line, column)| (*line, *column))
                .unwrap_or((span.line, span.column)),
            None => (1, 1),
        }
    }
}

fn is_bare_sequence(source: &str) -> bool {
    source
        .lines()
        .map(str::trim_start)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .is_some_and(|line| line.starts_with('-'))
}

/// Split a `key: value` line into key and remainder, rejecting non-keys.
fn split_key(line: &str) -> Option<(&str, &str)> {
    let (key, rest) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    Some((key, rest))
}

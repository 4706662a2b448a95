// File: ./src/rewrite.rs
//! Boundary to the assistant that rewrites the whole table from a
//! natural-language instruction.
//!
//! Whatever comes back is only a proposal: it must still parse as a task
//! table, and the caller shows the diff before accepting it.
use crate::model::table::find_header;
use crate::model::{
    Task, generate_diff, migrate_tasks, parse_markdown_table, recalculate_priorities,
    tasks_to_markdown,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// The assistant refused the request (safety filter, policy).
    Blocked(String),
    /// The table or the answer exceeded the assistant's limits.
    TooLarge,
    /// The answer did not contain a usable task table.
    Malformed(String),
    /// Transport or service failure.
    Unavailable(String),
}

impl fmt::Display for RewriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteError::Blocked(reason) => write!(f, "Request blocked: {}", reason),
            RewriteError::TooLarge => write!(f, "Task list too large for the assistant"),
            RewriteError::Malformed(reason) => write!(f, "Unusable answer: {}", reason),
            RewriteError::Unavailable(reason) => write!(f, "Assistant unavailable: {}", reason),
        }
    }
}

impl std::error::Error for RewriteError {}

pub trait Rewriter: Send + Sync {
    /// Returns replacement markdown for `markdown` following `instruction`.
    fn rewrite(
        &self,
        instruction: &str,
        markdown: &str,
    ) -> impl Future<Output = Result<String, RewriteError>> + Send;
}

#[derive(Debug, Clone)]
pub struct Proposal {
    pub tasks: Vec<Task>,
    /// Output of `generate_diff` against the current list.
    pub diff: String,
}

/// Removes a surrounding ``` fence (with or without a language tag).
fn strip_code_fence(output: &str) -> &str {
    let trimmed = output.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parses assistant output, rejecting anything without a task table.
pub fn validate_output(output: &str) -> Result<Vec<Task>, RewriteError> {
    let body = strip_code_fence(output);
    if find_header(body).is_none() {
        return Err(RewriteError::Malformed(
            "no task table header in the answer".to_string(),
        ));
    }
    Ok(recalculate_priorities(migrate_tasks(parse_markdown_table(
        body,
    ))))
}

/// Refreshes `updated_at` on tasks the proposal changed, so the edit wins
/// last-write-wins resolution against older concurrent edits.
fn stamp_changed(current: &[Task], proposed: Vec<Task>, now: DateTime<Utc>) -> Vec<Task> {
    let by_id: HashMap<&str, &Task> = current.iter().map(|t| (t.id.as_str(), t)).collect();
    proposed
        .into_iter()
        .map(|mut t| {
            if let Some(old) = by_id.get(t.id.as_str()) {
                let mut comparable = t.clone();
                comparable.updated_at = old.updated_at;
                if comparable != **old {
                    t.touch(now);
                }
            }
            t
        })
        .collect()
}

/// Asks `rewriter` to apply `instruction` to `tasks` and returns the
/// validated result with a diff for review. Nothing is saved.
pub async fn propose<W: Rewriter>(
    rewriter: &W,
    tasks: &[Task],
    instruction: &str,
) -> Result<Proposal, RewriteError> {
    let markdown = tasks_to_markdown(tasks);
    // Compare against the persisted form so ids line up with the answer.
    let current = parse_markdown_table(&markdown);

    let output = rewriter.rewrite(instruction, &markdown).await?;
    let proposed = stamp_changed(&current, validate_output(&output)?, Utc::now());
    let diff = generate_diff(&current, &proposed);
    log::debug!("Rewrite proposal: {} tasks", proposed.len());
    Ok(Proposal {
        tasks: proposed,
        diff,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```markdown\n| a |\n```"), "| a |");
        assert_eq!(strip_code_fence("```\n| a |\n```\n"), "| a |");
        assert_eq!(strip_code_fence("  | a |  "), "| a |");
    }

    #[test]
    fn test_validate_rejects_prose() {
        let err = validate_output("Sure! I reorganized your tasks.").unwrap_err();
        assert!(matches!(err, RewriteError::Malformed(_)));
    }

    #[test]
    fn test_validate_renumbers() {
        let out = "\
| P | Category | Subcategory | Task | Status | Color | Created | Updated |
|---|---|---|---|---|---|---|---|
| 5 | Home |  | B | to_do | white | 2025-01-01 | 2025-01-01 |
| 2 | Home |  | A | to_do | white | 2025-01-01 | 2025-01-01 |
";
        let tasks = validate_output(out).unwrap();
        assert_eq!(tasks[0].task, "A");
        assert_eq!(tasks[0].priority, 1);
        assert_eq!(tasks[1].priority, 2);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            RewriteError::TooLarge.to_string(),
            "Task list too large for the assistant"
        );
        assert_eq!(
            RewriteError::Blocked("safety".to_string()).to_string(),
            "Request blocked: safety"
        );
    }
}

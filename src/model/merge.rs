// File: ./src/model/merge.rs
use crate::model::item::{TaskColor, comparable_time, format_iso};
use crate::model::list::recalculate_priorities;
use crate::model::Task;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    Local,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
}

/// A field both sides changed to different values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeConflict {
    pub task_id: String,
    pub task_name: String,
    pub field: String,
    pub local_value: String,
    pub server_value: String,
    /// The side whose value was kept.
    pub resolution: Side,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeChange {
    pub kind: ChangeKind,
    pub source: Side,
    pub task_id: String,
    pub task_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeResult {
    pub merged: Vec<Task>,
    pub conflicts: Vec<MergeConflict>,
    pub changes: Vec<MergeChange>,
}

impl fmt::Display for MergeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} \"{}\"", self.source, self.kind, self.task_name)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" {}: local \"{}\" vs server \"{}\", kept {}",
            self.task_name, self.field, self.local_value, self.server_value, self.resolution
        )
    }
}

trait ConflictValue {
    fn render(&self) -> String;
}

impl ConflictValue for u32 {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl ConflictValue for String {
    fn render(&self) -> String {
        self.clone()
    }
}

impl ConflictValue for TaskColor {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl ConflictValue for Option<DateTime<Utc>> {
    fn render(&self) -> String {
        self.as_ref().map(format_iso).unwrap_or_default()
    }
}

/// Field-level merge of one task. `id` and `created_at` always come from
/// `base`. When both sides changed a field, the side with the newer
/// `updated_at` wins for every field of the task (ties go to local).
fn merge_task(
    base: &Task,
    local: &Task,
    server: &Task,
    conflicts: &mut Vec<MergeConflict>,
) -> Task {
    let local_wins = comparable_time(local.updated_at.as_ref())
        >= comparable_time(server.updated_at.as_ref());
    let mut merged = base.clone();

    macro_rules! merge_field {
        ($field:ident) => {
            let (b, l, s) = (&base.$field, &local.$field, &server.$field);
            if l != b && s != b {
                if l != s {
                    conflicts.push(MergeConflict {
                        task_id: base.id.clone(),
                        task_name: base.task.clone(),
                        field: stringify!($field).to_string(),
                        local_value: l.render(),
                        server_value: s.render(),
                        resolution: if local_wins { Side::Local } else { Side::Server },
                    });
                }
                merged.$field = if local_wins { l.clone() } else { s.clone() };
            } else if l != b {
                merged.$field = l.clone();
            } else if s != b {
                merged.$field = s.clone();
            }
        };
    }

    merge_field!(priority);
    merge_field!(category);
    merge_field!(subcategory);
    merge_field!(task);
    merge_field!(status);
    merge_field!(color);
    merge_field!(updated_at);

    merged
}

/// Whether any user-visible field differs. `updated_at` is not considered.
fn has_task_changed(old: &Task, new: &Task) -> bool {
    old.priority != new.priority
        || old.category != new.category
        || old.subcategory != new.subcategory
        || old.task != new.task
        || old.status != new.status
        || old.color != new.color
}

fn change_details(old: &Task, new: &Task) -> String {
    let mut parts = Vec::new();
    if old.task != new.task {
        parts.push("text changed".to_string());
    }
    if old.status != new.status {
        parts.push(format!("status: {} → {}", old.status, new.status));
    }
    if old.category != new.category {
        parts.push(format!("category: {} → {}", old.category, new.category));
    }
    if old.subcategory != new.subcategory {
        parts.push(format!("subcategory: {} → {}", old.subcategory, new.subcategory));
    }
    if old.priority != new.priority {
        parts.push(format!("priority: {} → {}", old.priority, new.priority));
    }
    if old.color != new.color {
        parts.push(format!("color: {} → {}", old.color, new.color));
    }
    parts.join(", ")
}

fn change(kind: ChangeKind, source: Side, task: &Task, details: Option<String>) -> MergeChange {
    MergeChange {
        kind,
        source,
        task_id: task.id.clone(),
        task_name: task.task.clone(),
        details,
    }
}

fn index(tasks: &[Task]) -> HashMap<&str, &Task> {
    tasks.iter().map(|t| (t.id.as_str(), t)).collect()
}

/// Ids in order of first appearance across the given lists.
fn ordered_ids<'a>(lists: &[&'a [Task]]) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    lists
        .iter()
        .flat_map(|list| list.iter())
        .map(|t| t.id.as_str())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Three-way merge of task lists keyed by id.
///
/// Without a usable ancestor (`None` or empty) this degrades to
/// [`simple_merge`]. The merged list is renumbered to priorities 1..N.
pub fn merge_tasks(base: Option<&[Task]>, local: &[Task], server: &[Task]) -> MergeResult {
    let base = match base {
        Some(b) if !b.is_empty() => b,
        _ => {
            log::debug!("No base snapshot, falling back to simple merge");
            return simple_merge(local, server);
        }
    };
    log::debug!(
        "Merging base={} local={} server={}",
        base.len(),
        local.len(),
        server.len()
    );

    let base_map = index(base);
    let local_map = index(local);
    let server_map = index(server);

    let mut result = MergeResult::default();

    for id in ordered_ids(&[base, local, server]) {
        match (base_map.get(id), local_map.get(id), server_map.get(id)) {
            (Some(b), Some(l), Some(s)) => {
                result
                    .merged
                    .push(merge_task(b, l, s, &mut result.conflicts));
                if has_task_changed(b, l) {
                    let details = change_details(b, l);
                    result
                        .changes
                        .push(change(ChangeKind::Modified, Side::Local, l, Some(details)));
                }
                if has_task_changed(b, s) {
                    let details = change_details(b, s);
                    result
                        .changes
                        .push(change(ChangeKind::Modified, Side::Server, s, Some(details)));
                }
            }
            (Some(b), None, Some(s)) => {
                if has_task_changed(b, s) {
                    log::debug!("\"{}\" deleted locally but modified on server", b.task);
                    result.merged.push((*s).clone());
                    result.changes.push(change(
                        ChangeKind::Modified,
                        Side::Server,
                        s,
                        Some("Modified on server (wins over local deletion)".to_string()),
                    ));
                } else {
                    result
                        .changes
                        .push(change(ChangeKind::Deleted, Side::Local, b, None));
                }
            }
            (Some(b), Some(l), None) => {
                if has_task_changed(b, l) {
                    log::debug!("\"{}\" deleted on server but modified locally", b.task);
                    result.merged.push((*l).clone());
                    result.changes.push(change(
                        ChangeKind::Modified,
                        Side::Local,
                        l,
                        Some("Modified locally (wins over server deletion)".to_string()),
                    ));
                } else {
                    result
                        .changes
                        .push(change(ChangeKind::Deleted, Side::Server, b, None));
                }
            }
            (Some(_), None, None) => {}
            (None, Some(l), None) => {
                result.merged.push((*l).clone());
                result
                    .changes
                    .push(change(ChangeKind::Added, Side::Local, l, None));
            }
            (None, None, Some(s)) => {
                result.merged.push((*s).clone());
                result
                    .changes
                    .push(change(ChangeKind::Added, Side::Server, s, None));
            }
            (None, Some(l), Some(s)) => {
                // Same id created on both sides: local acts as the ancestor.
                result
                    .merged
                    .push(merge_task(l, l, s, &mut result.conflicts));
                if has_task_changed(l, s) {
                    let details = change_details(l, s);
                    result
                        .changes
                        .push(change(ChangeKind::Modified, Side::Server, s, Some(details)));
                }
            }
            (None, None, None) => {}
        }
    }

    result.merged = recalculate_priorities(result.merged);
    log::debug!(
        "Merge complete: {} tasks, {} conflicts, {} changes",
        result.merged.len(),
        result.conflicts.len(),
        result.changes.len()
    );
    result
}

/// Two-way merge used when no common ancestor is known. Tasks present on
/// both sides resolve whole-task to the newer `updated_at` (ties go to
/// local); no conflicts can be detected.
pub fn simple_merge(local: &[Task], server: &[Task]) -> MergeResult {
    let local_map = index(local);
    let server_map = index(server);
    let mut result = MergeResult::default();

    for id in ordered_ids(&[local, server]) {
        match (local_map.get(id), server_map.get(id)) {
            (Some(l), Some(s)) => {
                if comparable_time(l.updated_at.as_ref()) >= comparable_time(s.updated_at.as_ref())
                {
                    result.merged.push((*l).clone());
                    result.changes.push(change(
                        ChangeKind::Modified,
                        Side::Local,
                        l,
                        Some("Kept local version (more recent)".to_string()),
                    ));
                } else {
                    result.merged.push((*s).clone());
                    result.changes.push(change(
                        ChangeKind::Modified,
                        Side::Server,
                        s,
                        Some("Kept server version (more recent)".to_string()),
                    ));
                }
            }
            (Some(l), None) => {
                result.merged.push((*l).clone());
                result
                    .changes
                    .push(change(ChangeKind::Added, Side::Local, l, None));
            }
            (None, Some(s)) => {
                result.merged.push((*s).clone());
                result
                    .changes
                    .push(change(ChangeKind::Added, Side::Server, s, None));
            }
            (None, None) => {}
        }
    }

    result.merged = recalculate_priorities(result.merged);
    result
}

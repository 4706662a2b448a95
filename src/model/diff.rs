// File: ./src/model/diff.rs
//! Human-readable two-way diff, shown before accepting a rewritten list.
use crate::model::Task;
use std::collections::HashMap;

pub const NO_CHANGES: &str = "No changes detected.";

fn field_changes(old: &Task, new: &Task) -> Vec<String> {
    let mut changes = Vec::new();
    if old.task != new.task {
        changes.push(format!(
            "description changed from \"{}\" to \"{}\"",
            old.task, new.task
        ));
    }
    if old.category != new.category {
        changes.push(format!(
            "category changed from \"{}\" to \"{}\"",
            old.category, new.category
        ));
    }
    if old.subcategory != new.subcategory {
        changes.push(format!(
            "subcategory changed from \"{}\" to \"{}\"",
            old.subcategory, new.subcategory
        ));
    }
    if old.status != new.status {
        changes.push(format!(
            "status changed from \"{}\" to \"{}\"",
            old.status, new.status
        ));
    }
    if old.priority != new.priority {
        changes.push(format!(
            "priority changed from {} to {}",
            old.priority, new.priority
        ));
    }
    if old.color != new.color {
        changes.push(format!(
            "color changed from \"{}\" to \"{}\"",
            old.color, new.color
        ));
    }
    changes
}

/// One line per added, removed or changed task, matched by id.
pub fn generate_diff(old_tasks: &[Task], new_tasks: &[Task]) -> String {
    let old_map: HashMap<&str, &Task> = old_tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let new_map: HashMap<&str, &Task> = new_tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut lines = Vec::new();

    for new in new_tasks {
        if !old_map.contains_key(new.id.as_str()) {
            lines.push(format!(
                "- Added task: \"{}\" in category \"{}\"",
                new.task, new.category
            ));
        }
    }

    for old in old_tasks {
        match new_map.get(old.id.as_str()) {
            None => lines.push(format!(
                "- Removed task: \"{}\" from category \"{}\"",
                old.task, old.category
            )),
            Some(new) => {
                let changes = field_changes(old, new);
                if !changes.is_empty() {
                    lines.push(format!("- For task \"{}\", {}", old.task, changes.join(", ")));
                }
            }
        }
    }

    if lines.is_empty() {
        NO_CHANGES.to_string()
    } else {
        lines.join("\n")
    }
}

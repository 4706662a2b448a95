// File: ./src/model/list.rs
//! Structural edits on a task collection. Every function returns a new list.
use crate::model::Task;

/// Assigns priorities 1..N in the current order.
pub fn renumber(mut tasks: Vec<Task>) -> Vec<Task> {
    for (idx, task) in tasks.iter_mut().enumerate() {
        task.priority = idx as u32 + 1;
    }
    tasks
}

/// Stable sort by the existing priority, then renumber 1..N.
pub fn recalculate_priorities(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by_key(|t| t.priority);
    renumber(tasks)
}

/// Inserts `new_task` at `index` (clamped to the length) and renumbers.
pub fn insert_task_at(tasks: &[Task], index: usize, new_task: Task) -> Vec<Task> {
    let mut result = tasks.to_vec();
    result.insert(index.min(result.len()), new_task);
    renumber(result)
}

/// Removes the task with `id`, if present, and renumbers the survivors.
pub fn delete_task(tasks: &[Task], id: &str) -> Vec<Task> {
    let result: Vec<Task> = tasks.iter().filter(|t| t.id != id).cloned().collect();
    renumber(result)
}

/// Positional replacement. Priorities are left alone.
pub fn update_task(tasks: &[Task], index: usize, updated: Task) -> Vec<Task> {
    let mut result = tasks.to_vec();
    match result.get_mut(index) {
        Some(slot) => *slot = updated,
        None => log::warn!(
            "Ignoring update at index {} (list has {} tasks)",
            index,
            tasks.len()
        ),
    }
    result
}

// File: ./src/history.rs
//! Bounded undo/redo over whole task-list snapshots.
//!
//! The stack is stored as JSON next to the local copy so that `undo` works
//! across separate runs of the binary.
use crate::context::AppContext;
use crate::model::Task;
use crate::storage::LocalStorage;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    states: Vec<Vec<Task>>,
    index: usize,
    limit: usize,
}

impl History {
    /// `limit` is the number of undo steps kept in addition to the current state.
    pub fn new(initial: Vec<Task>, limit: usize) -> Self {
        Self {
            states: vec![initial],
            index: 0,
            limit,
        }
    }

    pub fn current(&self) -> &[Task] {
        &self.states[self.index]
    }

    /// Records a new state. Anything that was undone is dropped.
    pub fn record(&mut self, tasks: Vec<Task>) {
        self.states.truncate(self.index + 1);
        self.states.push(tasks);
        if self.states.len() > self.limit + 1 {
            let excess = self.states.len() - (self.limit + 1);
            self.states.drain(..excess);
        }
        self.index = self.states.len() - 1;
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.states.len()
    }

    pub fn undo(&mut self) -> Option<&[Task]> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        Some(self.current())
    }

    pub fn redo(&mut self) -> Option<&[Task]> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        Some(self.current())
    }

    /// Reads the stored stack; `None` when nothing was saved yet.
    pub fn load(ctx: &dyn AppContext) -> Result<Option<Self>> {
        let path = ctx.get_history_path()?;
        LocalStorage::with_lock(&path, || match fs::read_to_string(&path) {
            Ok(json) => {
                let history: History = serde_json::from_str(&json)
                    .with_context(|| format!("Corrupt history file {:?}", path))?;
                Ok(Some(history))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        })
    }

    pub fn save(&self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_history_path()?;
        LocalStorage::with_lock(&path, || {
            let json = serde_json::to_string(self)?;
            LocalStorage::atomic_write(&path, json)
        })
    }

    /// Continues the stored stack when its current state is `tasks`.
    /// Otherwise the list changed elsewhere (a merge, another tool) and a
    /// fresh stack starts at `tasks`.
    pub fn resume(ctx: &dyn AppContext, tasks: Vec<Task>, limit: usize) -> Result<Self> {
        let stored = match Self::load(ctx) {
            Ok(stored) => stored,
            Err(e) => {
                log::warn!("Discarding unreadable undo history: {:#}", e);
                None
            }
        };
        match stored {
            Some(mut history) if history.current() == tasks.as_slice() => {
                history.limit = limit;
                Ok(history)
            }
            _ => Ok(Self::new(tasks, limit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;

    fn state(text: &str) -> Vec<Task> {
        vec![Task::new("C", text)]
    }

    #[test]
    fn test_undo_redo() {
        let mut h = History::new(state("a"), 20);
        assert!(!h.can_undo());
        h.record(state("b"));
        h.record(state("c"));

        assert_eq!(h.undo().unwrap()[0].task, "b");
        assert_eq!(h.undo().unwrap()[0].task, "a");
        assert!(h.undo().is_none());
        assert_eq!(h.redo().unwrap()[0].task, "b");
        assert!(h.can_redo());
    }

    #[test]
    fn test_record_after_undo_drops_redo_branch() {
        let mut h = History::new(state("a"), 20);
        h.record(state("b"));
        h.undo();
        h.record(state("c"));
        assert!(!h.can_redo());
        assert_eq!(h.current()[0].task, "c");
        assert_eq!(h.undo().unwrap()[0].task, "a");
    }

    #[test]
    fn test_limit_keeps_most_recent() {
        let mut h = History::new(state("0"), 2);
        for i in 1..=5 {
            h.record(state(&i.to_string()));
        }
        assert_eq!(h.current()[0].task, "5");
        assert_eq!(h.undo().unwrap()[0].task, "4");
        assert_eq!(h.undo().unwrap()[0].task, "3");
        assert!(h.undo().is_none());
    }

    #[test]
    fn test_resume_continues_matching_stack() {
        let ctx = TestContext::new();
        let (a, b) = (state("a"), state("b"));

        let mut h = History::resume(&ctx, a.clone(), 20).unwrap();
        assert!(!h.can_undo());
        h.record(b.clone());
        h.save(&ctx).unwrap();

        let mut resumed = History::resume(&ctx, b, 20).unwrap();
        assert_eq!(resumed.undo().unwrap(), a.as_slice());
    }

    #[test]
    fn test_resume_restarts_when_list_changed_elsewhere() {
        let ctx = TestContext::new();
        let mut h = History::new(state("a"), 20);
        h.record(state("b"));
        h.save(&ctx).unwrap();

        let resumed = History::resume(&ctx, state("merged"), 20).unwrap();
        assert!(!resumed.can_undo());
        assert_eq!(resumed.current()[0].task, "merged");
    }

    #[test]
    fn test_corrupt_file_is_not_fatal() {
        let ctx = TestContext::new();
        fs::write(ctx.get_history_path().unwrap(), "{not json").unwrap();
        assert!(History::load(&ctx).is_err());
        let h = History::resume(&ctx, state("a"), 20).unwrap();
        assert!(!h.can_undo());
    }
}

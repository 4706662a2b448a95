// File: ./src/storage.rs
// Local persistence of the task table: the device's own copy (`tasks.md`)
// and the last snapshot known to match the remote (`base.md`).
use crate::context::AppContext;
use crate::model::{Task, parse_markdown_table, tasks_to_markdown};
use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct LocalStorage;

impl LocalStorage {
    /// Sidecar lock file next to `file_path` (`tasks.md` -> `tasks.md.lock`).
    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut lock_path = file_path.to_path_buf();
        if let Some(ext) = lock_path.extension() {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".lock");
            lock_path.set_extension(new_ext);
        } else {
            lock_path.set_extension("lock");
        }
        lock_path
    }

    /// Runs `f` while holding an exclusive advisory lock for `file_path`.
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock_path = Self::get_lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {:?}", lock_path))?;

        file.lock_exclusive()?;
        let result = f();
        file.unlock()?;
        result
    }

    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    /// Reads a file under its lock; a missing file is `None`.
    fn read_locked(path: &Path) -> Result<Option<String>> {
        Self::with_lock(path, || match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::anyhow!("Failed to read {:?}: {}", path, e)),
        })
    }

    fn write_locked(path: &Path, content: &str) -> Result<()> {
        Self::with_lock(path, || Self::atomic_write(path, content))
    }

    pub fn load_markdown(ctx: &dyn AppContext) -> Result<Option<String>> {
        Self::read_locked(&ctx.get_local_tasks_path()?)
    }

    pub fn save_markdown(ctx: &dyn AppContext, markdown: &str) -> Result<()> {
        Self::write_locked(&ctx.get_local_tasks_path()?, markdown)
    }

    pub fn load_base(ctx: &dyn AppContext) -> Result<Option<String>> {
        Self::read_locked(&ctx.get_base_snapshot_path()?)
    }

    pub fn save_base(ctx: &dyn AppContext, markdown: &str) -> Result<()> {
        Self::write_locked(&ctx.get_base_snapshot_path()?, markdown)
    }

    /// Parsed local copy; empty when nothing has been saved yet.
    pub fn load(ctx: &dyn AppContext) -> Result<Vec<Task>> {
        Ok(Self::load_markdown(ctx)?
            .map(|md| parse_markdown_table(&md))
            .unwrap_or_default())
    }

    pub fn save(ctx: &dyn AppContext, tasks: &[Task]) -> Result<()> {
        Self::save_markdown(ctx, &tasks_to_markdown(tasks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TestContext;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lock_path_naming() {
        assert_eq!(
            LocalStorage::get_lock_path(Path::new("/x/tasks.md")),
            PathBuf::from("/x/tasks.md.lock")
        );
        assert_eq!(
            LocalStorage::get_lock_path(Path::new("/x/record")),
            PathBuf::from("/x/record.lock")
        );
    }

    #[test]
    fn test_missing_files_load_as_none() {
        let ctx = TestContext::new();
        assert!(LocalStorage::load_markdown(&ctx).unwrap().is_none());
        assert!(LocalStorage::load_base(&ctx).unwrap().is_none());
        assert!(LocalStorage::load(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let ctx = TestContext::new();
        let mut a = Task::new("Home", "Water plants");
        a.priority = 1;
        let mut b = Task::new("Work", "Line one\nline two");
        b.priority = 2;

        LocalStorage::save(&ctx, &[b.clone(), a.clone()]).unwrap();
        let loaded = LocalStorage::load(&ctx).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].task, "Water plants");
        assert_eq!(loaded[1].task, "Line one\nline two");

        LocalStorage::save_base(&ctx, "base content").unwrap();
        assert_eq!(
            LocalStorage::load_base(&ctx).unwrap().as_deref(),
            Some("base content")
        );
    }

    #[test]
    fn test_locking_concurrency() {
        let ctx = TestContext::new();
        let file_path = ctx.root.join("lock_test.txt");
        let path_ref = Arc::new(file_path.clone());

        let _ = fs::write(&file_path, "0");

        let mut handles = vec![];
        for _ in 0..10 {
            let p = path_ref.clone();
            handles.push(thread::spawn(move || {
                LocalStorage::with_lock(&p, || {
                    let content = fs::read_to_string(&*p).unwrap();
                    let num: i32 = content.parse().unwrap();
                    std::thread::sleep(std::time::Duration::from_millis(10));
                    fs::write(&*p, (num + 1).to_string()).unwrap();
                    Ok(())
                })
                .unwrap();
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        let content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "10");
    }
}

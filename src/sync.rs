// File: ./src/sync.rs
//! Offline-first load / save / reconcile workflow.
//!
//! The device always writes its local copy first. The remote is updated
//! only when it still matches the base snapshot (the last content both
//! sides agreed on); otherwise the three versions are merged and the merge
//! result is written to both places.
use crate::context::SharedContext;
use crate::model::{
    MergeResult, Task, check_and_migrate, is_old_format, merge_tasks, parse_markdown_table,
    tasks_to_markdown,
};
use crate::remote::RemoteStore;
use crate::storage::LocalStorage;
use anyhow::Result;

/// Seed list for a brand-new user with nothing stored anywhere.
pub const DEFAULT_TASKS_MARKDOWN: &str = "\
| P | Category | Subcategory | Task | Status | Color | Created | Updated |
|---|----------|-------------|------|--------|-------|---------|---------|
| 1 | Getting started |  | Add your first task | to_do | blue | 2025-01-01 | 2025-01-01 |
| 2 | Getting started |  | Mark a task as done | to_do | white | 2025-01-01 | 2025-01-01 |
| 3 | Getting started |  | Ask the assistant to reorganize the list | to_do | white | 2025-01-01 | 2025-01-01 |
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Remote,
    /// Unsynced local edits were merged with newer remote content.
    Merged,
    LocalCache,
    Defaults,
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub tasks: Vec<Task>,
    pub source: LoadSource,
    /// The stored table predated the `Updated` column.
    pub migrated: bool,
}

#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub remote_saved: bool,
    /// Present when the remote had diverged and a merge was needed. The
    /// merged list replaces what the caller saved.
    pub merge: Option<MergeResult>,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub merge: MergeResult,
    pub remote_saved: bool,
}

pub struct SyncManager<R: RemoteStore> {
    ctx: SharedContext,
    remote: R,
    user_id: String,
}

impl<R: RemoteStore> SyncManager<R> {
    pub fn new(ctx: SharedContext, remote: R, user_id: impl Into<String>) -> Self {
        Self {
            ctx,
            remote,
            user_id: user_id.into(),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Remote content, with an empty record treated as absent.
    async fn fetch_remote(&self) -> Result<Option<String>> {
        Ok(self
            .remote
            .fetch(&self.user_id)
            .await?
            .map(|r| r.content)
            .filter(|c| !c.trim().is_empty()))
    }

    /// Loads the task list: remote first, then the local cache, then the
    /// starter list. Remote failures are logged, not returned.
    pub async fn load(&self) -> Result<LoadOutcome> {
        let ctx = self.ctx.as_ref();
        let mut found = None;

        match self.fetch_remote().await {
            Ok(Some(content)) => {
                let local = LocalStorage::load_markdown(ctx)?;
                let base = LocalStorage::load_base(ctx)?;
                let unsynced = local.as_deref().is_some_and(|l| {
                    base.as_deref() != Some(l) && l != content.as_str()
                });
                if unsynced {
                    log::info!("Local copy has unsynced edits, merging with remote");
                    let migrated = local.as_deref().is_some_and(is_old_format)
                        || is_old_format(&content);
                    let report = self
                        .merge_and_store(
                            base.as_deref(),
                            local.as_deref().unwrap_or_default(),
                            Some(content.as_str()),
                        )
                        .await?;
                    return Ok(LoadOutcome {
                        tasks: report.merge.merged,
                        source: LoadSource::Merged,
                        migrated,
                    });
                }
                LocalStorage::save_markdown(ctx, &content)?;
                LocalStorage::save_base(ctx, &content)?;
                found = Some((content, LoadSource::Remote));
            }
            Ok(None) => log::info!("Remote has no tasks for {}", self.user_id),
            Err(e) => log::warn!("Failed to fetch tasks from remote, using local copy: {:#}", e),
        }

        if found.is_none()
            && let Some(content) = LocalStorage::load_markdown(ctx)?
        {
            found = Some((content, LoadSource::LocalCache));
        }

        let Some((content, source)) = found else {
            log::info!("No stored tasks, seeding defaults");
            let tasks = parse_markdown_table(DEFAULT_TASKS_MARKDOWN);
            self.save(&tasks).await?;
            return Ok(LoadOutcome {
                tasks,
                source: LoadSource::Defaults,
                migrated: false,
            });
        };

        let check = check_and_migrate(&content);
        log::info!("Loaded {} tasks from {:?}", check.tasks.len(), source);
        Ok(LoadOutcome {
            tasks: check.tasks,
            source,
            migrated: check.needs_migration,
        })
    }

    /// Writes the local copy, then brings the remote up to date.
    ///
    /// Only a failing local write is an error; an unreachable remote leaves
    /// `remote_saved` false and the next save or [`Self::reconcile`] retries.
    pub async fn save(&self, tasks: &[Task]) -> Result<SaveOutcome> {
        let ctx = self.ctx.as_ref();
        let markdown = tasks_to_markdown(tasks);
        LocalStorage::save_markdown(ctx, &markdown)?;

        let remote = match self.fetch_remote().await {
            Ok(remote) => remote,
            Err(e) => {
                log::warn!("Remote unreachable, tasks saved locally only: {:#}", e);
                return Ok(SaveOutcome {
                    remote_saved: false,
                    merge: None,
                });
            }
        };

        let base = LocalStorage::load_base(ctx)?;
        let diverged = match &remote {
            Some(remote) => base.as_deref() != Some(remote.as_str()),
            None => false,
        };

        if diverged {
            log::info!("Remote changed since last sync, merging");
            let report = self
                .merge_and_store(base.as_deref(), &markdown, remote.as_deref())
                .await?;
            return Ok(SaveOutcome {
                remote_saved: report.remote_saved,
                merge: Some(report.merge),
            });
        }

        Ok(SaveOutcome {
            remote_saved: self.push(&markdown).await?,
            merge: None,
        })
    }

    /// Three-way merge of the base snapshot, the local copy and the remote
    /// content, written back to both sides. A failing fetch is an error.
    pub async fn reconcile(&self) -> Result<SyncReport> {
        let ctx = self.ctx.as_ref();
        let remote = self.fetch_remote().await?;
        let base = LocalStorage::load_base(ctx)?;
        let local = LocalStorage::load_markdown(ctx)?.unwrap_or_default();
        self.merge_and_store(base.as_deref(), &local, remote.as_deref())
            .await
    }

    async fn merge_and_store(
        &self,
        base: Option<&str>,
        local: &str,
        remote: Option<&str>,
    ) -> Result<SyncReport> {
        // A vanished remote record is not a mass deletion.
        let base = if remote.is_some() { base } else { None };
        let base_tasks = base.map(parse_markdown_table);
        let local_tasks = parse_markdown_table(local);
        let remote_tasks = remote.map(parse_markdown_table).unwrap_or_default();

        let merge = merge_tasks(base_tasks.as_deref(), &local_tasks, &remote_tasks);
        for conflict in &merge.conflicts {
            log::info!("Conflict resolved: {}", conflict);
        }

        let markdown = tasks_to_markdown(&merge.merged);
        LocalStorage::save_markdown(self.ctx.as_ref(), &markdown)?;
        let remote_saved = self.push(&markdown).await?;
        Ok(SyncReport {
            merge,
            remote_saved,
        })
    }

    /// Pushes `markdown` and records it as the new base on success.
    async fn push(&self, markdown: &str) -> Result<bool> {
        match self.remote.push(&self.user_id, markdown).await {
            Ok(_) => {
                LocalStorage::save_base(self.ctx.as_ref(), markdown)?;
                Ok(true)
            }
            Err(e) => {
                log::warn!("Failed to save tasks to remote, kept local copy: {:#}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_markdown_parses() {
        let tasks = parse_markdown_table(DEFAULT_TASKS_MARKDOWN);
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.category == "Getting started"));
        let priorities: Vec<u32> = tasks.iter().map(|t| t.priority).collect();
        assert_eq!(priorities, vec![1, 2, 3]);
    }
}

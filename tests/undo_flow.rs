// File: ./tests/undo_flow.rs
use std::sync::Arc;
use tasktable::context::{SharedContext, TestContext};
use tasktable::history::History;
use tasktable::model::{Task, insert_task_at, parse_markdown_table};
use tasktable::remote::{MemoryRemote, RemoteStore};
use tasktable::storage::LocalStorage;
use tasktable::sync::SyncManager;

#[tokio::test]
async fn test_undo_restores_list_before_import_and_pushes_it() {
    let ctx = Arc::new(TestContext::new());
    let shared: SharedContext = ctx.clone();
    let manager = SyncManager::new(shared, MemoryRemote::new(), "alice");
    let before = manager.load().await.unwrap().tasks;

    // An import: snapshot, save, record the stored result.
    let stored = LocalStorage::load(ctx.as_ref()).unwrap();
    let mut history = History::resume(ctx.as_ref(), stored, 5).unwrap();
    let imported = insert_task_at(&before, 0, Task::new("Home", "Buy milk"));
    manager.save(&imported).await.unwrap();
    history.record(LocalStorage::load(ctx.as_ref()).unwrap());
    history.save(ctx.as_ref()).unwrap();

    // A later run picks the stack up from disk.
    let after_import = LocalStorage::load(ctx.as_ref()).unwrap();
    let mut history = History::resume(ctx.as_ref(), after_import.clone(), 5).unwrap();
    let restored = history.undo().unwrap().to_vec();
    assert_eq!(restored, before);
    manager.save(&restored).await.unwrap();
    history.save(ctx.as_ref()).unwrap();

    let record = manager.remote().fetch("alice").await.unwrap().unwrap();
    assert_eq!(parse_markdown_table(&record.content), before);

    // Redo brings the import back.
    let current = LocalStorage::load(ctx.as_ref()).unwrap();
    let mut history = History::resume(ctx.as_ref(), current, 5).unwrap();
    assert!(history.can_redo());
    assert_eq!(history.redo().unwrap(), after_import.as_slice());
}

#[test]
fn test_undo_limit_bounds_the_stack() {
    let ctx = TestContext::new();
    let mut tasks = vec![Task::new("Home", "0")];
    let mut history = History::resume(&ctx, tasks.clone(), 2).unwrap();
    for i in 1..=4 {
        tasks = insert_task_at(&tasks, 0, Task::new("Home", &i.to_string()));
        history.record(tasks.clone());
    }
    history.save(&ctx).unwrap();

    let mut history = History::resume(&ctx, tasks, 2).unwrap();
    assert!(history.undo().is_some());
    assert!(history.undo().is_some());
    assert!(history.undo().is_none());
}

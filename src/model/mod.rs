// File: ./src/model/mod.rs
pub mod diff;
pub mod id;
pub mod item;
pub mod list;
pub mod merge;
pub mod migration;
pub mod table;

pub use diff::generate_diff;
pub use id::generate_stable_id;
pub use item::{Task, TaskColor, comparable_time, parse_timestamp, partition_done};
pub use list::{delete_task, insert_task_at, recalculate_priorities, renumber, update_task};
pub use merge::{ChangeKind, MergeChange, MergeConflict, MergeResult, Side, merge_tasks, simple_merge};
pub use migration::{MigrationCheck, check_and_migrate, is_old_format, migrate_tasks};
pub use table::{parse_markdown_table, tasks_to_markdown};

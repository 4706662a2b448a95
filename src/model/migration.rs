// File: ./src/model/migration.rs
//! Upgrades tables written before the `Updated` column existed.
use crate::model::Task;
use crate::model::table::{find_header, header_columns, parse_markdown_table};

#[derive(Debug, Clone)]
pub struct MigrationCheck {
    pub needs_migration: bool,
    pub tasks: Vec<Task>,
}

/// True when the document has a task table whose header lacks `Updated`.
pub fn is_old_format(markdown: &str) -> bool {
    match find_header(markdown) {
        Some((_, header)) => !header_columns(header).iter().any(|h| h == "updated"),
        None => false,
    }
}

/// Back-fills `updated_at` from `created_at` where it is missing.
pub fn migrate_tasks(tasks: Vec<Task>) -> Vec<Task> {
    let missing = tasks.iter().filter(|t| t.updated_at.is_none()).count();
    if missing > 0 {
        log::info!("Back-filling updated_at on {} task(s)", missing);
    }
    tasks
        .into_iter()
        .map(|mut t| {
            t.updated_at = t.updated_at.or(Some(t.created_at));
            t
        })
        .collect()
}

/// Parses `markdown` and returns the migrated tasks along with whether the
/// input was in the old layout.
pub fn check_and_migrate(markdown: &str) -> MigrationCheck {
    let needs_migration = is_old_format(markdown);
    if needs_migration {
        log::info!("Old table format detected, migrating");
    }
    MigrationCheck {
        needs_migration,
        tasks: migrate_tasks(parse_markdown_table(markdown)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::table::TABLE_HEADER;

    const SEVEN_COLUMNS: &str = "\
| P | Category | Subcategory | Task | Status | Color | Created |
|---|----------|-------------|------|--------|-------|---------|
| 1 | Home |  | Buy milk | to_do | white | 2025-06-10 |
";

    #[test]
    fn test_detects_old_format() {
        assert!(is_old_format(SEVEN_COLUMNS));
        assert!(is_old_format("| Category | Task | Status | Done |\n|---|---|---|---|\n"));
        assert!(!is_old_format(&format!("{TABLE_HEADER}\n")));
        assert!(!is_old_format("no table at all"));
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let mut tasks = parse_markdown_table(SEVEN_COLUMNS);
        tasks[0].updated_at = None;
        let once = migrate_tasks(tasks);
        assert_eq!(once[0].updated_at, Some(once[0].created_at));
        let twice = migrate_tasks(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_check_and_migrate_returns_tasks() {
        let check = check_and_migrate(SEVEN_COLUMNS);
        assert!(check.needs_migration);
        assert_eq!(check.tasks.len(), 1);
        assert_eq!(check.tasks[0].updated_at, Some(check.tasks[0].created_at));

        let current = check_and_migrate(&format!(
            "{TABLE_HEADER}\n|---|---|---|---|---|---|---|---|\n| 1 | A |  | B | to_do | white | 2025-01-01 | 2025-01-02 |\n"
        ));
        assert!(!current.needs_migration);
        assert_eq!(current.tasks.len(), 1);
    }
}

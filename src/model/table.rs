// File: ./src/model/table.rs
//! Markdown table codec for task lists.
//!
//! The persisted shape is always the 8-column table below. Older layouts
//! (Category|Task|Status|Done, +Effort, +Criticality, the boolean Today
//! column) are still accepted on input and folded into the current fields.
use crate::model::id::generate_stable_id;
use crate::model::item::{STATUS_DONE, Task, TaskColor, parse_timestamp};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::str::FromStr;

pub const HEADER_MARKER: &str = "| Category |";
pub const TABLE_HEADER: &str = "| P | Category | Subcategory | Task | Status | Color | Created | Updated |";
const TABLE_SEPARATOR: &str =
    "|---|----------|-------------|------|--------|-------|---------|---------|";
const CANONICAL_WIDTH: usize = 8;

/// Returns the index and text of the task table header line, if any.
pub fn find_header(markdown: &str) -> Option<(usize, &str)> {
    markdown
        .lines()
        .enumerate()
        .find(|(_, line)| line.contains(HEADER_MARKER))
}

/// Header cell names, lowercased, without the empty edge segments.
pub fn header_columns(header_line: &str) -> Vec<String> {
    header_line
        .split('|')
        .map(|h| h.trim().to_lowercase())
        .filter(|h| !h.is_empty())
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
struct Columns {
    priority: Option<usize>,
    category: Option<usize>,
    subcategory: Option<usize>,
    task: Option<usize>,
    status: Option<usize>,
    color: Option<usize>,
    created: Option<usize>,
    updated: Option<usize>,
    today: Option<usize>,
    done: Option<usize>,
    width: usize,
}

impl Columns {
    fn from_header(line: &str) -> Self {
        let names = header_columns(line);
        let mut cols = Columns {
            width: names.len(),
            ..Default::default()
        };
        for (idx, name) in names.iter().enumerate() {
            let slot = match name.as_str() {
                "p" | "#" | "priority" => &mut cols.priority,
                "category" => &mut cols.category,
                "subcategory" => &mut cols.subcategory,
                "task" => &mut cols.task,
                "status" => &mut cols.status,
                "color" => &mut cols.color,
                "created" => &mut cols.created,
                "updated" => &mut cols.updated,
                "today" => &mut cols.today,
                "done" => &mut cols.done,
                // effort, criticality and unknown columns are dropped
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(idx);
            }
        }
        cols
    }

    fn is_canonical(&self) -> bool {
        self.width == CANONICAL_WIDTH
            && [
                self.priority,
                self.category,
                self.subcategory,
                self.task,
                self.status,
                self.color,
                self.created,
                self.updated,
            ]
            .iter()
            .enumerate()
            .all(|(i, c)| *c == Some(i))
    }
}

/// Cell values of one body row, before defaults are applied.
#[derive(Debug, Default)]
struct RawRow {
    priority: String,
    category: String,
    subcategory: String,
    task: String,
    status: String,
    color: String,
    created: String,
    updated: String,
    legacy: LegacyFlags,
}

/// Columns only older layouts carried. Decoded here and folded into the
/// current fields; `Task` never sees them.
#[derive(Debug, Default)]
struct LegacyFlags {
    today: Option<bool>,
    done: Option<bool>,
}

fn is_truthy(cell: &str) -> bool {
    matches!(
        cell.trim().to_lowercase().as_str(),
        "yes" | "true" | "x" | "done" | "1"
    )
}

fn is_separator(line: &str) -> bool {
    let t = line.trim();
    t.contains('-') && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// Splits on `|` except where it is escaped as `\|`.
fn split_unescaped(line: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '|' => {
                segments.push(&line[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    segments.push(&line[start..]);
    segments
}

/// Reverses [`escape_cell`]. Other backslashes are kept as written.
fn unescape_cell(cell: &str) -> String {
    let mut out = String::with_capacity(cell.len());
    let mut chars = cell.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(&next) = chars.peek()
            && (next == '|' || next == '\\')
        {
            out.push(next);
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

fn escape_cell(cell: &str) -> String {
    cell.replace('\\', "\\\\").replace('|', "\\|")
}

/// Drops the empty segments produced by the leading and trailing pipe.
fn inner_segments(line: &str) -> Vec<&str> {
    let segments = split_unescaped(line.trim());
    let start = usize::from(segments.first().is_some_and(|s| s.trim().is_empty()));
    let mut end = segments.len();
    if end > start && segments[end - 1].trim().is_empty() {
        end -= 1;
    }
    segments[start..end].to_vec()
}

fn split_row(line: &str, cols: &Columns) -> RawRow {
    let segments = inner_segments(line);

    // Current layout: anything between the first three and the last four
    // cells belongs to the task text, which may itself contain pipes.
    if cols.is_canonical() && segments.len() >= CANONICAL_WIDTH {
        let n = segments.len();
        let text = |s: &str| unescape_cell(s.trim());
        return RawRow {
            priority: text(segments[0]),
            category: text(segments[1]),
            subcategory: text(segments[2]),
            task: text(segments[3..n - 4].join("|").as_str()),
            status: text(segments[n - 4]),
            color: text(segments[n - 3]),
            created: text(segments[n - 2]),
            updated: text(segments[n - 1]),
            legacy: LegacyFlags::default(),
        };
    }

    let cell = |col: Option<usize>| -> String {
        col.and_then(|i| segments.get(i))
            .map(|s| unescape_cell(s.trim()))
            .unwrap_or_default()
    };
    RawRow {
        priority: cell(cols.priority),
        category: cell(cols.category),
        subcategory: cell(cols.subcategory),
        task: cell(cols.task),
        status: cell(cols.status),
        color: cell(cols.color),
        created: cell(cols.created),
        updated: cell(cols.updated),
        legacy: LegacyFlags {
            today: cols.today.map(|_| is_truthy(&cell(cols.today))),
            done: cols.done.map(|_| is_truthy(&cell(cols.done))),
        },
    }
}

/// Converts `<br>`, `<br/>` and `<br />` (any case) to newlines.
fn br_to_newline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('<') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match br_tag_len(tail) {
            Some(len) => {
                out.push('\n');
                rest = &tail[len..];
            }
            None => {
                out.push('<');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn br_tag_len(tail: &str) -> Option<usize> {
    let bytes = tail.as_bytes();
    if bytes.len() < 4
        || !bytes[1].eq_ignore_ascii_case(&b'b')
        || !bytes[2].eq_ignore_ascii_case(&b'r')
    {
        return None;
    }
    let mut i = 3;
    while i < bytes.len() && bytes[i] == b' ' {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'/' {
        i += 1;
    }
    (i < bytes.len() && bytes[i] == b'>').then_some(i + 1)
}

fn build_task(row: RawRow, position: usize, cols: &Columns, now: DateTime<Utc>) -> Task {
    let priority = row
        .priority
        .parse::<u32>()
        .ok()
        .filter(|p| *p >= 1)
        .unwrap_or(position as u32);
    let created_at = parse_timestamp(&row.created).unwrap_or(now);
    let updated_at = parse_timestamp(&row.updated).unwrap_or(created_at);

    let color = match TaskColor::from_str(&row.color) {
        Ok(c) => c,
        Err(_) if cols.color.is_none() && row.legacy.today == Some(true) => TaskColor::Red,
        Err(_) => TaskColor::White,
    };

    let mut status = row.status;
    if status.is_empty() && row.legacy.done == Some(true) {
        status = STATUS_DONE.to_string();
    }

    let task = br_to_newline(&row.task);
    Task {
        id: generate_stable_id(&created_at, &task, &row.category),
        priority,
        category: row.category,
        subcategory: row.subcategory,
        task,
        status,
        color,
        created_at,
        updated_at: Some(updated_at),
    }
}

/// Parses the first task table found in `markdown`.
///
/// A document without a table is an empty list, not an error. Rows keep
/// their input order; later rows whose id repeats an earlier one are dropped.
pub fn parse_markdown_table(markdown: &str) -> Vec<Task> {
    let Some((header_idx, header)) = find_header(markdown) else {
        log::debug!("No task table header found");
        return Vec::new();
    };
    let cols = Columns::from_header(header);
    let now = Utc::now();

    let mut tasks = Vec::new();
    for line in markdown.lines().skip(header_idx + 1) {
        if !line.contains('|') || is_separator(line) {
            continue;
        }
        let row = split_row(line, &cols);
        if row.category.is_empty() && row.task.is_empty() {
            log::debug!("Skipping row without category or task: {}", line.trim());
            continue;
        }
        let position = tasks.len() + 1;
        tasks.push(build_task(row, position, &cols, now));
    }

    let parsed = tasks.len();
    let mut seen = HashSet::new();
    tasks.retain(|t| seen.insert(t.id.clone()));
    if tasks.len() != parsed {
        log::debug!(
            "Dropped {} duplicate task row(s) while parsing",
            parsed - tasks.len()
        );
    }
    tasks
}

fn format_date(ts: Option<&DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn single_line(cell: &str) -> String {
    escape_cell(&cell.replace("\r\n", " ").replace('\n', " "))
}

/// Renders tasks as the current 8-column table, ordered by priority.
pub fn tasks_to_markdown(tasks: &[Task]) -> String {
    let mut sorted: Vec<&Task> = tasks.iter().collect();
    sorted.sort_by_key(|t| t.priority);

    let mut out = String::new();
    out.push_str(TABLE_HEADER);
    out.push('\n');
    out.push_str(TABLE_SEPARATOR);
    out.push('\n');
    for t in sorted {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} |\n",
            t.priority,
            single_line(&t.category),
            single_line(&t.subcategory),
            escape_cell(&t.task).replace("\r\n", "<br>").replace('\n', "<br>"),
            single_line(&t.status),
            t.color,
            format_date(Some(&t.created_at)),
            format_date(t.updated_at.as_ref()),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURRENT: &str = "\
| P | Category | Subcategory | Task | Status | Color | Created | Updated |
|---|----------|-------------|------|--------|-------|---------|---------|
| 2 | Home | Kitchen | Fix the sink | to_do | blue | 2025-06-10 | 2025-06-11 |
| 1 | Work |  | Send invoice | done | grey | 2025-06-09 | 2025-06-12 |
";

    #[test]
    fn test_parse_current_layout() {
        let tasks = parse_markdown_table(CURRENT);
        assert_eq!(tasks.len(), 2);
        let sink = &tasks[0];
        assert_eq!(sink.priority, 2);
        assert_eq!(sink.category, "Home");
        assert_eq!(sink.subcategory, "Kitchen");
        assert_eq!(sink.task, "Fix the sink");
        assert_eq!(sink.color, TaskColor::Blue);
        assert_eq!(format_date(Some(&sink.created_at)), "2025-06-10");
        assert_eq!(format_date(sink.updated_at.as_ref()), "2025-06-11");
        assert_eq!(tasks[1].subcategory, "");
    }

    #[test]
    fn test_no_header_is_empty() {
        assert!(parse_markdown_table("# Just notes\n\nnothing here").is_empty());
        assert!(parse_markdown_table("").is_empty());
    }

    #[test]
    fn test_pipes_inside_task_text_survive() {
        let md = format!(
            "{TABLE_HEADER}\n{TABLE_SEPARATOR}\n| 1 | Dev | Shell | run a | b | grep c | to_do | white | 2025-01-01 | 2025-01-02 |\n"
        );
        let tasks = parse_markdown_table(&md);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task, "run a | b | grep c");
        assert_eq!(tasks[0].status, "to_do");
        assert_eq!(format_date(tasks[0].updated_at.as_ref()), "2025-01-02");
    }

    #[test]
    fn test_escaped_pipes_do_not_split_cells() {
        assert_eq!(split_unescaped(r"a \| b | c"), vec![r"a \| b ", " c"]);
        assert_eq!(split_unescaped(r"a \\| b"), vec![r"a \\", " b"]);
        assert_eq!(unescape_cell(r"R&D \| Ops"), "R&D | Ops");
        assert_eq!(unescape_cell(r"C:\temp"), r"C:\temp");
        for raw in ["a | b", r"back\slash", r"tail\", r"\|"] {
            assert_eq!(unescape_cell(&escape_cell(raw)), raw);
        }
    }

    #[test]
    fn test_rows_without_category_or_task_are_skipped() {
        let md = format!(
            "{TABLE_HEADER}\n{TABLE_SEPARATOR}\n| 1 |  | Sub |  | to_do | white | 2025-01-01 | 2025-01-01 |\n| 2 | Home |  | Keep me | to_do | white | 2025-01-01 | 2025-01-01 |\n"
        );
        let tasks = parse_markdown_table(&md);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].task, "Keep me");
        assert_eq!(tasks[0].priority, 2);
    }

    #[test]
    fn test_br_variants_become_newlines() {
        assert_eq!(br_to_newline("a<br>b<BR/>c<Br />d"), "a\nb\nc\nd");
        assert_eq!(br_to_newline("x < y <b>bold</b> <bra>"), "x < y <b>bold</b> <bra>");
    }

    #[test]
    fn test_defaults_for_bad_cells() {
        let md = format!(
            "{TABLE_HEADER}\n{TABLE_SEPARATOR}\n| ? | Home |  | Water plants | to_do | purple | garbage | |\n"
        );
        let before = Utc::now();
        let tasks = parse_markdown_table(&md);
        let t = &tasks[0];
        assert_eq!(t.priority, 1);
        assert_eq!(t.color, TaskColor::White);
        assert!(t.created_at >= before);
        assert_eq!(t.updated_at, Some(t.created_at));
    }

    #[test]
    fn test_legacy_today_column_maps_to_red() {
        let md = "\
| Category | Task | Status | Effort | Criticality | Today |
|----------|------|--------|--------|-------------|-------|
| Home | Call mom | to_do | 3 | 2 | yes |
| Home | Pay rent | to_do | 1 | 1 |  |
";
        let tasks = parse_markdown_table(md);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].color, TaskColor::Red);
        assert_eq!(tasks[1].color, TaskColor::White);
        assert_eq!(tasks[1].priority, 2);
    }

    #[test]
    fn test_legacy_done_column_sets_status() {
        let md = "\
| Category | Task | Status | Done |
|----------|------|--------|------|
| Home | Laundry |  | yes |
| Home | Dishes | in_progress | no |
";
        let tasks = parse_markdown_table(md);
        assert_eq!(tasks[0].status, STATUS_DONE);
        assert_eq!(tasks[1].status, "in_progress");
    }

    #[test]
    fn test_duplicate_rows_keep_first() {
        let md = format!(
            "{TABLE_HEADER}\n{TABLE_SEPARATOR}\n\
| 1 | Home |  | Buy milk | to_do | white | 2025-06-10 | 2025-06-10 |\n\
| 2 | Home |  | Buy milk | done | red | 2025-06-10 | 2025-06-11 |\n"
        );
        let tasks = parse_markdown_table(&md);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, "to_do");
        assert_eq!(tasks[0].color, TaskColor::White);
    }

    #[test]
    fn test_serialize_sorts_and_escapes() {
        let mut tasks = parse_markdown_table(CURRENT);
        tasks[0].task = "line one\nline two".to_string();
        let md = tasks_to_markdown(&tasks);
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], TABLE_HEADER);
        assert!(lines[2].starts_with("| 1 | Work |"));
        assert_eq!(
            lines[3],
            "| 2 | Home | Kitchen | line one<br>line two | to_do | blue | 2025-06-10 | 2025-06-11 |"
        );
    }

    #[test]
    fn test_missing_updated_renders_empty() {
        let mut tasks = parse_markdown_table(CURRENT);
        tasks[1].updated_at = None;
        let md = tasks_to_markdown(&tasks);
        assert!(md.contains("| done | grey | 2025-06-09 |  |"));
    }
}

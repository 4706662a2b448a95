// File: ./src/model/item.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

pub const STATUS_TODO: &str = "to_do";
pub const STATUS_DONE: &str = "done";

/// Row marker shown next to a task. Replaces the old boolean "today" column.
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TaskColor {
    #[default]
    White,
    Grey,
    Red,
    Blue,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Dense rank (1..N) inside a collection; not a weight.
    pub priority: u32,
    pub category: String,
    pub subcategory: String,
    pub task: String,
    pub status: String,
    #[serde(default)]
    pub color: TaskColor,
    pub created_at: DateTime<Utc>,
    /// Authority for last-write-wins. Callers stamp it on every edit.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// A task inserted by the user (not parsed), with a fresh time+random id.
    pub fn new(category: &str, text: &str) -> Self {
        let now = Utc::now();
        let random = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("task-{:x}-{}", now.timestamp_millis(), &random[..8]),
            priority: 1,
            category: category.to_string(),
            subcategory: String::new(),
            task: text.to_string(),
            status: STATUS_TODO.to_string(),
            color: TaskColor::default(),
            created_at: now,
            updated_at: Some(now),
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }

    pub fn is_done(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_DONE)
    }

    /// Case-insensitive match against category and task text.
    pub fn matches(&self, query: &str) -> bool {
        let q = query.to_lowercase();
        self.category.to_lowercase().contains(&q) || self.task.to_lowercase().contains(&q)
    }
}

/// Splits a list into (active, done), keeping the original order in both halves.
pub fn partition_done(tasks: &[Task]) -> (Vec<Task>, Vec<Task>) {
    tasks.iter().cloned().partition(|t| !t.is_done())
}

/// Epoch milliseconds used for last-write-wins comparisons.
///
/// A missing timestamp maps to `i64::MIN`, so it loses against any real
/// timestamp. Two missing timestamps compare equal, and equal times resolve
/// toward the local side.
pub fn comparable_time(ts: Option<&DateTime<Utc>>) -> i64 {
    ts.map(|t| t.timestamp_millis()).unwrap_or(i64::MIN)
}

/// Lenient timestamp parsing for table cells. Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ndt.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

/// ISO-8601 rendering with millisecond precision and a `Z` suffix.
pub fn format_iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// File: ./src/model/id.rs
//! Content-derived task identifiers.
//!
//! Parsing the same table on two devices must yield the same ids for the
//! same rows, otherwise the merge would see every row as added twice.
use crate::model::item::format_iso;
use chrono::{DateTime, Utc};

const TEXT_PREFIX_UNITS: usize = 50;

fn djb2(input: &str) -> u32 {
    input
        .encode_utf16()
        .fold(5381u32, |hash, unit| {
            hash.wrapping_shl(5).wrapping_add(hash).wrapping_add(unit as u32)
        })
}

/// `task-<created millis hex>-<djb2 hex>` over `created|text[..50]|category`.
///
/// The text prefix is counted in UTF-16 code units so ids agree with the
/// ones the web client produced for the same rows.
pub fn generate_stable_id(created_at: &DateTime<Utc>, task: &str, category: &str) -> String {
    let units: Vec<u16> = task.encode_utf16().take(TEXT_PREFIX_UNITS).collect();
    let prefix = String::from_utf16_lossy(&units);
    let composite = format!("{}|{}|{}", format_iso(created_at), prefix, category);
    format!(
        "task-{:x}-{:08x}",
        created_at.timestamp_millis(),
        djb2(&composite)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::parse_timestamp;

    #[test]
    fn test_djb2_known_values() {
        assert_eq!(djb2(""), 5381);
        // 5381 * 33 + 'a'
        assert_eq!(djb2("a"), 177_670);
    }

    #[test]
    fn test_stable_id_is_deterministic() {
        let created = parse_timestamp("2025-06-12").unwrap();
        let a = generate_stable_id(&created, "Buy milk", "Home");
        let b = generate_stable_id(&created, "Buy milk", "Home");
        assert_eq!(a, b);
        assert!(a.starts_with(&format!("task-{:x}-", created.timestamp_millis())));
        assert_eq!(a.rsplit('-').next().unwrap().len(), 8);
    }

    #[test]
    fn test_stable_id_depends_on_each_input() {
        let created = parse_timestamp("2025-06-12").unwrap();
        let later = parse_timestamp("2025-06-13").unwrap();
        let base = generate_stable_id(&created, "Buy milk", "Home");
        assert_ne!(base, generate_stable_id(&later, "Buy milk", "Home"));
        assert_ne!(base, generate_stable_id(&created, "Buy bread", "Home"));
        assert_ne!(base, generate_stable_id(&created, "Buy milk", "Errands"));
    }

    #[test]
    fn test_only_text_prefix_counts() {
        let created = parse_timestamp("2025-06-12").unwrap();
        let prefix = "x".repeat(50);
        let a = generate_stable_id(&created, &format!("{prefix} first tail"), "C");
        let b = generate_stable_id(&created, &format!("{prefix} second tail"), "C");
        assert_eq!(a, b);
    }
}

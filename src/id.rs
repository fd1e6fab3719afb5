//! IdAllocator (`spec.md` §4.3, C3): monotone, collision-free identifier
//! minting per entity kind.
//!
//! Allocation always happens under the exclusive lock that guards the
//! subsequent write (the caller holds that lock before calling
//! [`next_id`]), which is what makes collisions impossible — the scan and
//! the write that follows it are atomic with respect to other callers.

use std::path::Path;

use crate::error::Result;
use crate::model::Kind;
use crate::store::file::FileStore;

/// Minimum zero-padding width; grows once the numeric suffix would overflow
/// the current width.
const MIN_WIDTH: usize = 3;

/// Scans `dir` for files named `<prefix><digits>` and returns the next
/// identifier, `<prefix>` zero-padded to at least [`MIN_WIDTH`] digits.
pub fn next_id(store: &FileStore, dir: &Path, prefix: &str) -> Result<String> {
    let names = store.list(dir)?;
    let max = max_suffix(&names, prefix);
    Ok(format_id(prefix, max + 1))
}

/// Same scan, but over the ids embedded in records of a shared file (used
/// for Constraint, whose records all live in one file rather than one file
/// per id).
#[must_use]
pub fn next_id_from_ids<'a>(ids: impl Iterator<Item = &'a str>, prefix: &str) -> String {
    let mut max = 0u64;
    for id in ids {
        if let Some(rest) = id.strip_prefix(prefix)
            && let Ok(n) = rest.parse::<u64>()
        {
            max = max.max(n);
        }
    }
    format_id(prefix, max + 1)
}

fn max_suffix(names: &[String], prefix: &str) -> u64 {
    let mut max = 0u64;
    for name in names {
        if let Some(rest) = name.strip_prefix(prefix)
            && let Ok(n) = rest.parse::<u64>()
        {
            max = max.max(n);
        }
    }
    max
}

fn format_id(prefix: &str, n: u64) -> String {
    let mut width = MIN_WIDTH;
    while 10u64.pow(width as u32) <= n {
        width += 1;
    }
    format!("{prefix}{n:0width$}")
}

/// Validates that `id` matches the per-kind prefix and a numeric suffix of
/// at least [`MIN_WIDTH`] digits. Identifier format validation is
/// authoritative: no other component mints or accepts malformed ids.
#[must_use]
pub fn is_valid(kind: Kind, id: &str) -> bool {
    if kind == Kind::Vision {
        return id == "vision";
    }
    let prefix = kind.id_prefix();
    let Some(rest) = id.strip_prefix(prefix) else {
        return false;
    };
    !rest.is_empty() && rest.len() >= MIN_WIDTH && rest.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_id_is_padded_to_min_width() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let id = next_id(&store, Path::new("objectives"), "obj-").unwrap();
        assert_eq!(id, "obj-001");
    }

    #[test]
    fn next_id_is_max_plus_one() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.write(Path::new("tasks/task-001"), b"x").unwrap();
        store.write(Path::new("tasks/task-007"), b"x").unwrap();
        let id = next_id(&store, Path::new("tasks"), "task-").unwrap();
        assert_eq!(id, "task-008");
    }

    #[test]
    fn width_grows_past_three_digits() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.write(Path::new("tasks/task-999"), b"x").unwrap();
        let id = next_id(&store, Path::new("tasks"), "task-").unwrap();
        assert_eq!(id, "task-1000");
    }

    #[test]
    fn validates_vision_fixed_id() {
        assert!(is_valid(Kind::Vision, "vision"));
        assert!(!is_valid(Kind::Vision, "vision-1"));
    }

    #[test]
    fn rejects_wrong_prefix() {
        assert!(!is_valid(Kind::Objective, "risk-001"));
    }

    #[test]
    fn rejects_short_suffix() {
        assert!(!is_valid(Kind::Objective, "obj-1"));
    }

    #[test]
    fn next_id_from_shared_file_ids() {
        let ids = vec!["con-001", "con-003"];
        let id = next_id_from_ids(ids.into_iter(), "con-");
        assert_eq!(id, "con-004");
    }
}

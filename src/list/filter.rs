//! Name matching and ordering primitives used by the walker and by backends
//! implementing the directory-lister contract.

use std::sync::OnceLock;

use super::tree_walk::Entry;
use super::SLASH_SEPARATOR;

static CASE_INSENSITIVE: OnceLock<bool> = OnceLock::new();

/// Override the platform default for name comparisons. Takes effect only if
/// called before the first comparison; returns false when it was too late.
pub fn set_case_insensitive(value: bool) -> bool {
    CASE_INSENSITIVE.set(value).is_ok()
}

fn case_insensitive() -> bool {
    // Windows file systems compare names case-insensitively.
    *CASE_INSENSITIVE.get_or_init(|| cfg!(windows))
}

/// Prefix match honoring the process-wide case sensitivity rule.
pub fn has_prefix(s: &str, prefix: &str) -> bool {
    if case_insensitive() {
        s.to_lowercase().starts_with(&prefix.to_lowercase())
    } else {
        s.starts_with(prefix)
    }
}

/// Suffix match honoring the process-wide case sensitivity rule.
pub fn has_suffix(s: &str, suffix: &str) -> bool {
    if case_insensitive() {
        s.to_lowercase().ends_with(&suffix.to_lowercase())
    } else {
        s.ends_with(suffix)
    }
}

/// Keep only entries whose name starts with `prefix_entry`.
pub fn filter_matching_prefix(entries: Vec<Entry>, prefix_entry: &str) -> Vec<Entry> {
    if entries.is_empty() || prefix_entry.is_empty() {
        return entries;
    }
    entries
        .into_iter()
        .filter(|entry| has_prefix(&entry.name, prefix_entry))
        .collect()
}

/// Backend helper satisfying the directory-lister contract: filter by
/// `prefix_entry` and sort ascending by name. The returned flag asks the
/// walker to classify leaves itself; this implementation never does.
pub fn filter_list_entries(entries: Vec<Entry>, prefix_entry: &str) -> (Vec<Entry>, bool) {
    let mut entries = filter_matching_prefix(entries, prefix_entry);
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    (entries, false)
}

/// Join a directory prefix and an entry name, preserving any trailing
/// separator on the name.
pub fn path_join(prefix_dir: &str, name: &str) -> String {
    if prefix_dir.is_empty() {
        return name.to_string();
    }
    if prefix_dir.ends_with(SLASH_SEPARATOR) {
        format!("{prefix_dir}{name}")
    } else {
        format!("{prefix_dir}{SLASH_SEPARATOR}{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> Entry {
        Entry {
            name: name.to_string(),
            info: None,
        }
    }

    #[test]
    fn prefix_and_suffix_match() {
        assert!(has_prefix("a1/b.txt", "a1/"));
        assert!(!has_prefix("a1/b.txt", "a2"));
        assert!(has_prefix("anything", ""));
        assert!(has_suffix("a1/", "/"));
        assert!(!has_suffix("a1", "/"));
    }

    #[test]
    fn filter_keeps_only_matching_entries() {
        let entries = vec![entry("a1.txt"), entry("a2/"), entry("b1.txt")];
        let filtered = filter_matching_prefix(entries, "a");
        let names: Vec<_> = filtered.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a1.txt", "a2/"]);
    }

    #[test]
    fn filter_with_empty_prefix_is_identity() {
        let entries = vec![entry("b"), entry("a")];
        let filtered = filter_matching_prefix(entries, "");
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].name, "b");
    }

    #[test]
    fn list_entries_come_back_sorted() {
        let entries = vec![entry("c/"), entry("a.txt"), entry("b.txt")];
        let (sorted, delay) = filter_list_entries(entries, "");
        let names: Vec<_> = sorted.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt", "c/"]);
        assert!(!delay);
    }

    #[test]
    fn join_preserves_trailing_separator() {
        assert_eq!(path_join("one/two/", "three/"), "one/two/three/");
        assert_eq!(path_join("", "a.txt"), "a.txt");
        assert_eq!(path_join("one", "a.txt"), "one/a.txt");
    }
}

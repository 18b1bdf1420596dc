//! Baseline snapshot model and drift comparison.
//!
//! A snapshot is a deterministic, sorted inventory of the working tree; the
//! scanner that produces it lives in [`crate::io::scan`]. Comparison against
//! a later snapshot is pure set arithmetic and lives here.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Extension bucket for files without an extension.
pub const NO_EXTENSION: &str = "(no extension)";

/// Point-in-time inventory of the repository used for drift comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: String,
    pub summary: InventorySummary,
    pub directories: Vec<String>,
    pub files: Vec<String>,
    pub key_files_present: BTreeMap<String, bool>,
    pub git_status: GitStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total_files: usize,
    pub total_directories: usize,
    pub file_types: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitStatus {
    pub branch: String,
    pub last_commit_hash: String,
}

impl GitStatus {
    pub fn unknown() -> Self {
        Self {
            branch: "unknown".to_string(),
            last_commit_hash: "unknown".to_string(),
        }
    }
}

/// Change in one extension's file count between baseline and current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeChange {
    pub extension: String,
    pub baseline: usize,
    pub current: usize,
}

impl TypeChange {
    pub fn delta(&self) -> i64 {
        self.current as i64 - self.baseline as i64
    }
}

/// Everything that differs between a baseline and a later snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaselineDiff {
    pub new_files: Vec<String>,
    pub removed_files: Vec<String>,
    pub new_directories: Vec<String>,
    pub removed_directories: Vec<String>,
    /// Sorted by absolute delta, largest first.
    pub type_changes: Vec<TypeChange>,
}

impl BaselineDiff {
    /// True when the trees are identical (type-count deltas follow from
    /// file-set equality, so they are not consulted).
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty()
            && self.removed_files.is_empty()
            && self.new_directories.is_empty()
            && self.removed_directories.is_empty()
    }
}

/// Compare two snapshots.
pub fn diff_snapshots(baseline: &Snapshot, current: &Snapshot) -> BaselineDiff {
    let baseline_files: BTreeSet<&str> = baseline.files.iter().map(String::as_str).collect();
    let current_files: BTreeSet<&str> = current.files.iter().map(String::as_str).collect();
    let baseline_dirs: BTreeSet<&str> = baseline.directories.iter().map(String::as_str).collect();
    let current_dirs: BTreeSet<&str> = current.directories.iter().map(String::as_str).collect();

    let mut type_changes = Vec::new();
    let all_extensions: BTreeSet<&str> = baseline
        .summary
        .file_types
        .keys()
        .chain(current.summary.file_types.keys())
        .map(String::as_str)
        .collect();
    for extension in all_extensions {
        let before = baseline.summary.file_types.get(extension).copied().unwrap_or(0);
        let after = current.summary.file_types.get(extension).copied().unwrap_or(0);
        if before != after {
            type_changes.push(TypeChange {
                extension: extension.to_string(),
                baseline: before,
                current: after,
            });
        }
    }
    type_changes.sort_by_key(|change| std::cmp::Reverse(change.delta().abs()));

    BaselineDiff {
        new_files: diff_sorted(&current_files, &baseline_files),
        removed_files: diff_sorted(&baseline_files, &current_files),
        new_directories: diff_sorted(&current_dirs, &baseline_dirs),
        removed_directories: diff_sorted(&baseline_dirs, &current_dirs),
        type_changes,
    }
}

fn diff_sorted(left: &BTreeSet<&str>, right: &BTreeSet<&str>) -> Vec<String> {
    left.difference(right).map(|path| path.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(files: &[&str], dirs: &[&str]) -> Snapshot {
        let mut file_types: BTreeMap<String, usize> = BTreeMap::new();
        for file in files {
            let ext = std::path::Path::new(file)
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
                .unwrap_or_else(|| NO_EXTENSION.to_string());
            *file_types.entry(ext).or_insert(0) += 1;
        }
        Snapshot {
            timestamp: "t".to_string(),
            summary: InventorySummary {
                total_files: files.len(),
                total_directories: dirs.len(),
                file_types,
            },
            directories: dirs.iter().map(|d| d.to_string()).collect(),
            files: files.iter().map(|f| f.to_string()).collect(),
            key_files_present: BTreeMap::new(),
            git_status: GitStatus::unknown(),
        }
    }

    #[test]
    fn identical_snapshots_diff_empty() {
        let a = snapshot(&["src/lib.rs", "README.md"], &["src"]);
        let diff = diff_snapshots(&a, &a.clone());
        assert!(diff.is_empty());
        assert!(diff.type_changes.is_empty());
    }

    #[test]
    fn added_and_removed_entries_are_sorted() {
        let baseline = snapshot(&["a.rs", "z.rs"], &["src"]);
        let current = snapshot(&["a.rs", "b.md", "c.md"], &["docs", "src"]);

        let diff = diff_snapshots(&baseline, &current);
        assert_eq!(diff.new_files, vec!["b.md", "c.md"]);
        assert_eq!(diff.removed_files, vec!["z.rs"]);
        assert_eq!(diff.new_directories, vec!["docs"]);
        assert!(diff.removed_directories.is_empty());
    }

    #[test]
    fn type_changes_sorted_by_absolute_delta() {
        let baseline = snapshot(&["a.rs"], &[]);
        let current = snapshot(&["a.md", "b.md", "c.md"], &[]);

        let diff = diff_snapshots(&baseline, &current);
        assert_eq!(diff.type_changes[0].extension, ".md");
        assert_eq!(diff.type_changes[0].delta(), 3);
        assert_eq!(diff.type_changes[1].extension, ".rs");
        assert_eq!(diff.type_changes[1].delta(), -1);
    }
}

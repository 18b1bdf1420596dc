//! Repository snapshot scanner.
//!
//! Walks the working tree (excluding version-control, dependency, build, and
//! cache directories) and produces the deterministic inventory captured in
//! `baseline_snapshot.json`. Pure read; two scans of an unchanged tree yield
//! identical results.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

use crate::core::inventory::{GitStatus, InventorySummary, NO_EXTENSION, Snapshot};
use crate::io::git::Git;

/// Directory names never descended into. Hidden directories are excluded
/// wholesale on top of this list.
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    ".wrapper",
    "dist",
    "build",
    ".next",
    "coverage",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    ".eggs",
    ".cache",
    "target",
];

/// Exact names and suffixes excluded from the file inventory. Hidden files
/// (e.g. `.gitignore`) are kept.
const EXCLUDED_FILE_NAMES: &[&str] = &[".DS_Store", "Thumbs.db"];
const EXCLUDED_FILE_SUFFIXES: &[&str] = &[".pyc", ".pyo", ".so", ".dylib"];

/// Marker files whose presence is recorded in every snapshot.
pub const KEY_FILES: &[&str] = &[
    "package.json",
    "Dockerfile",
    "docker-compose.yml",
    "README.md",
    "README",
    "requirements.txt",
    "setup.py",
    "pyproject.toml",
    "Makefile",
    "tsconfig.json",
    ".gitignore",
    "go.mod",
    "Cargo.toml",
];

fn dir_excluded(name: &str) -> bool {
    name.starts_with('.') || EXCLUDED_DIRS.contains(&name)
}

fn file_excluded(name: &str) -> bool {
    if EXCLUDED_FILE_NAMES.contains(&name) {
        return true;
    }
    EXCLUDED_FILE_SUFFIXES
        .iter()
        .any(|suffix| name.ends_with(suffix))
}

/// Sorted inventory of one walk of `root`.
#[derive(Debug, Clone, Default)]
pub struct ScanData {
    pub directories: Vec<String>,
    pub files: Vec<String>,
    pub file_types: BTreeMap<String, usize>,
}

/// Walk the tree under `root` applying the denylist.
pub fn scan_repository(root: &Path) -> Result<ScanData> {
    let mut data = ScanData::default();

    let walker = WalkDir::new(root).min_depth(1).into_iter();
    for entry in walker.filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        !(entry.file_type().is_dir() && dir_excluded(&name))
    }) {
        let entry = entry.context("walk repository")?;
        let rel = entry
            .path()
            .strip_prefix(root)
            .context("strip scan root prefix")?;
        let rel_str = rel
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            data.directories.push(rel_str);
        } else if entry.file_type().is_file() {
            let name = entry.file_name().to_string_lossy();
            if file_excluded(&name) {
                continue;
            }
            let extension = rel
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
                .unwrap_or_else(|| NO_EXTENSION.to_string());
            *data.file_types.entry(extension).or_insert(0) += 1;
            data.files.push(rel_str);
        }
    }

    data.directories.sort();
    data.files.sort();
    debug!(
        files = data.files.len(),
        directories = data.directories.len(),
        "scanned repository"
    );
    Ok(data)
}

/// Capture a complete snapshot of `root`, including git branch/commit when
/// available. A snapshot must not require a repo, so git trouble falls back
/// to `"unknown"`.
pub fn capture_snapshot(root: &Path, timestamp: String) -> Result<Snapshot> {
    let data = scan_repository(root)?;

    let files: std::collections::BTreeSet<&str> =
        data.files.iter().map(String::as_str).collect();
    let key_files_present: BTreeMap<String, bool> = KEY_FILES
        .iter()
        .map(|name| (name.to_string(), files.contains(name)))
        .collect();

    let git = Git::new(root);
    let git_status = match (git.current_branch(), git.head_short_sha()) {
        (Ok(branch), Ok(last_commit_hash)) => GitStatus {
            branch,
            last_commit_hash,
        },
        _ => GitStatus::unknown(),
    };

    Ok(Snapshot {
        timestamp,
        summary: InventorySummary {
            total_files: data.files.len(),
            total_directories: data.directories.len(),
            file_types: data.file_types,
        },
        directories: data.directories,
        files: data.files,
        key_files_present,
        git_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, "x").expect("write");
    }

    #[test]
    fn scan_is_sorted_and_excludes_denylisted_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(root, "src/lib.rs");
        touch(root, "src/main.rs");
        touch(root, "README.md");
        touch(root, "node_modules/pkg/index.js");
        touch(root, ".wrapper/state.json");
        touch(root, "target/debug/app");

        let data = scan_repository(root).expect("scan");
        assert_eq!(data.directories, vec!["src"]);
        assert_eq!(data.files, vec!["README.md", "src/lib.rs", "src/main.rs"]);
        assert_eq!(data.file_types.get(".rs"), Some(&2));
        assert_eq!(data.file_types.get(".md"), Some(&1));
    }

    #[test]
    fn hidden_files_kept_hidden_dirs_dropped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(root, ".gitignore");
        touch(root, ".github/workflows/ci.yml");

        let data = scan_repository(root).expect("scan");
        assert_eq!(data.files, vec![".gitignore"]);
        assert!(data.directories.is_empty());
    }

    #[test]
    fn artifact_suffixes_are_excluded() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(root, "module.pyc");
        touch(root, "lib.so");
        touch(root, "keep.py");

        let data = scan_repository(root).expect("scan");
        assert_eq!(data.files, vec!["keep.py"]);
    }

    #[test]
    fn files_without_extension_bucket_under_sentinel() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(root, "Makefile");
        touch(root, "LICENSE");

        let data = scan_repository(root).expect("scan");
        assert_eq!(data.file_types.get(NO_EXTENSION), Some(&2));
    }

    #[test]
    fn scan_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(root, "a/x.rs");
        touch(root, "b/y.md");

        let first = scan_repository(root).expect("scan");
        let second = scan_repository(root).expect("scan");
        assert_eq!(first.files, second.files);
        assert_eq!(first.directories, second.directories);
        assert_eq!(first.file_types, second.file_types);
    }

    #[test]
    fn snapshot_records_key_file_presence() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        touch(root, "Cargo.toml");

        let snapshot = capture_snapshot(root, "t0".to_string()).expect("snapshot");
        assert_eq!(snapshot.key_files_present.get("Cargo.toml"), Some(&true));
        assert_eq!(snapshot.key_files_present.get("go.mod"), Some(&false));
        assert_eq!(snapshot.git_status.branch, "unknown");
        assert_eq!(snapshot.summary.total_files, 1);
    }
}

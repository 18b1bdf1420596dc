//! Snapshot capture and drift reporting against a real repository.

use wrapper::core::inventory::{Snapshot, diff_snapshots};
use wrapper::io::scan::capture_snapshot;
use wrapper::io::store::load_json;
use wrapper::test_support::TestRepo;
use wrapper::{diff_baseline, snapshot};

#[test]
fn snapshot_command_persists_inventory_with_git_status() {
    let repo = TestRepo::new().expect("repo");
    let paths = repo.paths();
    repo.write_file("src/lib.rs", "pub fn answer() -> u32 { 42 }\n")
        .expect("write");
    repo.commit_all("add lib").expect("commit");

    assert!(snapshot::run(&paths).expect("snapshot"));

    let stored: Snapshot = load_json(&paths.baseline_snapshot)
        .expect("load")
        .expect("baseline written");
    assert!(stored.files.contains(&"src/lib.rs".to_string()));
    assert!(stored.directories.contains(&"src".to_string()));
    assert_eq!(stored.git_status.branch, "main");
    assert_ne!(stored.git_status.last_commit_hash, "unknown");
    assert_eq!(stored.key_files_present.get("README.md"), Some(&true));
}

#[test]
fn unmodified_tree_reports_no_drift() {
    let repo = TestRepo::new().expect("repo");
    let paths = repo.paths();

    assert!(snapshot::run(&paths).expect("snapshot"));

    let baseline: Snapshot = load_json(&paths.baseline_snapshot)
        .expect("load")
        .expect("baseline");
    let current = capture_snapshot(repo.root(), "t1".to_string()).expect("rescan");
    assert!(diff_snapshots(&baseline, &current).is_empty());

    assert!(diff_baseline::run(&paths).expect("diff-baseline"));
}

#[test]
fn added_files_show_up_as_drift() {
    let repo = TestRepo::new().expect("repo");
    let paths = repo.paths();

    assert!(snapshot::run(&paths).expect("snapshot"));
    repo.write_file("docs/notes.md", "notes\n").expect("write");

    let baseline: Snapshot = load_json(&paths.baseline_snapshot)
        .expect("load")
        .expect("baseline");
    let current = capture_snapshot(repo.root(), "t1".to_string()).expect("rescan");
    let drift = diff_snapshots(&baseline, &current);

    assert_eq!(drift.new_files, vec!["docs/notes.md"]);
    assert_eq!(drift.new_directories, vec!["docs"]);
    assert!(drift.removed_files.is_empty());

    // The command still succeeds; drift is a report, not an error.
    assert!(diff_baseline::run(&paths).expect("diff-baseline"));
}

#[test]
fn diff_baseline_without_baseline_fails_with_remediation() {
    let repo = TestRepo::new().expect("repo");
    let paths = repo.paths();
    assert!(!diff_baseline::run(&paths).expect("diff-baseline"));
}

//! `wrapper diff-baseline` - report drift between the persisted baseline and
//! a fresh scan.

use anyhow::Result;

use crate::core::inventory::{BaselineDiff, Snapshot, diff_snapshots};
use crate::io::paths::WrapperPaths;
use crate::io::scan::capture_snapshot;
use crate::io::store::{load_json, now_timestamp};

const MAX_FILE_LINES: usize = 20;
const MAX_DIR_LINES: usize = 10;
const MAX_TYPE_LINES: usize = 5;

/// Entry point for `wrapper diff-baseline`.
pub fn run(paths: &WrapperPaths) -> Result<bool> {
    let Some(baseline) = load_json::<Snapshot>(&paths.baseline_snapshot)? else {
        println!("Error: No baseline snapshot found.");
        println!("Run 'wrapper snapshot' or 'wrapper verify' (first time) to create one.");
        return Ok(false);
    };

    println!("Comparing against baseline from {}", baseline.timestamp);
    println!();

    let current = capture_snapshot(&paths.root, now_timestamp())?;
    let diff = diff_snapshots(&baseline, &current);

    if diff.is_empty() {
        println!("NO CHANGES DETECTED");
        println!();
        println!("Repository matches baseline snapshot.");
        return Ok(true);
    }

    println!("CHANGES DETECTED:");
    println!();
    report_paths("New files", &diff.new_files, "+", MAX_FILE_LINES, "");
    report_paths("Removed files", &diff.removed_files, "-", MAX_FILE_LINES, "");
    report_paths("New directories", &diff.new_directories, "+", MAX_DIR_LINES, "/");
    report_paths(
        "Removed directories",
        &diff.removed_directories,
        "-",
        MAX_DIR_LINES,
        "/",
    );

    report_summary(&baseline, &current, &diff);

    Ok(true)
}

fn report_paths(label: &str, entries: &[String], sign: &str, cap: usize, suffix: &str) {
    if entries.is_empty() {
        return;
    }
    println!("{label} ({}):", entries.len());
    for entry in entries.iter().take(cap) {
        println!("  {sign} {entry}{suffix}");
    }
    if entries.len() > cap {
        println!("  ... and {} more", entries.len() - cap);
    }
    println!();
}

fn report_summary(baseline: &Snapshot, current: &Snapshot, diff: &BaselineDiff) {
    let file_delta = current.summary.total_files as i64 - baseline.summary.total_files as i64;
    let dir_delta =
        current.summary.total_directories as i64 - baseline.summary.total_directories as i64;

    println!("Summary:");
    println!(
        "  Files: {} -> {} ({})",
        baseline.summary.total_files,
        current.summary.total_files,
        signed(file_delta)
    );
    println!(
        "  Directories: {} -> {} ({})",
        baseline.summary.total_directories,
        current.summary.total_directories,
        signed(dir_delta)
    );

    if !diff.type_changes.is_empty() {
        println!();
        println!("File type changes:");
        for change in diff.type_changes.iter().take(MAX_TYPE_LINES) {
            println!(
                "  {}: {} -> {} ({})",
                change.extension,
                change.baseline,
                change.current,
                signed(change.delta())
            );
        }
    }
}

fn signed(delta: i64) -> String {
    if delta >= 0 {
        format!("+{delta}")
    } else {
        delta.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_formats_both_directions() {
        assert_eq!(signed(3), "+3");
        assert_eq!(signed(0), "+0");
        assert_eq!(signed(-2), "-2");
    }
}

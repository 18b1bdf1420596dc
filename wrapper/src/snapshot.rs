//! `wrapper snapshot` - capture the baseline snapshot manually.
//!
//! Usually auto-captured on first verification; this command re-captures and
//! overwrites on demand.

use anyhow::Result;

use crate::io::paths::WrapperPaths;
use crate::io::scan::capture_snapshot;
use crate::io::store::{now_timestamp, save_json};

/// Entry point for `wrapper snapshot`.
pub fn run(paths: &WrapperPaths) -> Result<bool> {
    println!("Capturing baseline snapshot...");

    let snapshot = capture_snapshot(&paths.root, now_timestamp())?;
    save_json(paths, &paths.baseline_snapshot, &snapshot)?;

    println!();
    println!("Baseline snapshot captured: {}", paths.baseline_snapshot.display());
    println!();
    println!("Summary:");
    println!("  Timestamp: {}", snapshot.timestamp);
    println!("  Total files: {}", snapshot.summary.total_files);
    println!("  Total directories: {}", snapshot.summary.total_directories);

    println!();
    println!("File types:");
    let mut by_count: Vec<(&String, &usize)> = snapshot.summary.file_types.iter().collect();
    by_count.sort_by_key(|(ext, count)| (std::cmp::Reverse(**count), (*ext).clone()));
    for (ext, count) in by_count.iter().take(10) {
        println!("    {ext}: {count}");
    }
    if by_count.len() > 10 {
        println!("    ... and {} more", by_count.len() - 10);
    }

    println!();
    println!("Git status:");
    println!("    Branch: {}", snapshot.git_status.branch);
    println!("    Commit: {}", snapshot.git_status.last_commit_hash);

    let present: Vec<&str> = snapshot
        .key_files_present
        .iter()
        .filter(|(_, present)| **present)
        .map(|(name, _)| name.as_str())
        .collect();
    if !present.is_empty() {
        println!();
        println!("Key files found: {}", present.join(", "));
    }

    Ok(true)
}

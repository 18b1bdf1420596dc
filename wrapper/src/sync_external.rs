//! `wrapper sync-external` - aggregate other repos' ledgers into
//! `external_state.json`.
//!
//! The only writer of that document. Per-path failures are warnings; the
//! sync aborts only when zero paths succeed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::core::state::{ExternalRepo, ExternalState, Ledger};
use crate::io::paths::{WRAPPER_DIR, WrapperPaths};
use crate::io::store::save_json;

/// Entry point for `wrapper sync-external`.
pub fn run(paths: &WrapperPaths, from: &[PathBuf]) -> Result<bool> {
    if from.is_empty() {
        println!("Error: No --from paths provided.");
        println!("Usage: wrapper sync-external --from ../ui --from ../llm");
        return Ok(false);
    }

    println!("Syncing external state from {} repo(s)...", from.len());

    let mut external = ExternalState::new();
    let mut errors = Vec::new();

    for path in from {
        let repo_path = std::path::absolute(path).unwrap_or_else(|_| path.clone());
        println!();
        println!("  Reading: {}", repo_path.display());

        match extract_repo_state(&repo_path) {
            Ok((name, info)) => {
                println!("    Repo: {name}");
                println!("    Steps: {}", info.done_steps.len());
                println!("    Invariants: {}", info.invariants.len());
                external.insert(name, info);
            }
            Err(err) => {
                println!("    ERROR: {err:#}");
                errors.push(format!("{err:#}"));
            }
        }
    }

    if external.is_empty() {
        println!();
        println!("No valid repos found. external_state.json NOT written.");
        return Ok(false);
    }

    save_json(paths, &paths.external_state, &external)?;

    println!();
    println!("Written: {}", paths.external_state.display());
    println!(
        "Repos synced: {}",
        external.keys().cloned().collect::<Vec<_>>().join(", ")
    );
    if !errors.is_empty() {
        println!();
        println!("Warnings: {} repo(s) had errors (see above)", errors.len());
    }

    Ok(true)
}

/// Read another repo's `.wrapper/state.json` and reduce it to the external
/// view: `"{step_id}: {result}"` summaries plus invariants, keyed by the
/// declared repo name (directory name as fallback).
pub fn extract_repo_state(repo_path: &Path) -> Result<(String, ExternalRepo)> {
    if !repo_path.exists() {
        return Err(anyhow!("Path does not exist: {}", repo_path.display()));
    }
    if !repo_path.is_dir() {
        return Err(anyhow!("Path is not a directory: {}", repo_path.display()));
    }
    let wrapper_dir = repo_path.join(WRAPPER_DIR);
    if !wrapper_dir.exists() {
        return Err(anyhow!(
            "No {WRAPPER_DIR} directory found in: {}",
            repo_path.display()
        ));
    }
    let state_file = wrapper_dir.join("state.json");
    if !state_file.exists() {
        return Err(anyhow!("No state.json found in: {}", wrapper_dir.display()));
    }

    let contents = std::fs::read_to_string(&state_file)
        .with_context(|| format!("read {}", state_file.display()))?;
    let ledger: Ledger = serde_json::from_str(&contents)
        .with_context(|| format!("invalid JSON in {}", state_file.display()))?;

    let name = if ledger.repo.trim().is_empty() {
        repo_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    } else {
        ledger.repo.clone()
    };

    let done_steps = ledger
        .done_steps
        .iter()
        .map(|step| format!("{}: {}", step.step_id, step.result))
        .collect();

    Ok((
        name,
        ExternalRepo {
            done_steps,
            invariants: ledger.invariants,
            status: None,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::store::save_ledger;

    fn seeded_repo(temp: &tempfile::TempDir, repo: &str) -> PathBuf {
        let root = temp.path().join(repo);
        let paths = WrapperPaths::new(&root);
        let mut ledger = Ledger::new(repo);
        ledger.push_done("baseline-check", "verification completed", "t1".to_string());
        ledger.invariants.push("single entry point".to_string());
        save_ledger(&paths, &ledger).expect("save ledger");
        root
    }

    #[test]
    fn extracts_reduced_view() {
        let temp = tempfile::tempdir().expect("tempdir");
        let repo = seeded_repo(&temp, "ui");

        let (name, info) = extract_repo_state(&repo).expect("extract");
        assert_eq!(name, "ui");
        assert_eq!(info.done_steps, vec!["baseline-check: verification completed"]);
        assert_eq!(info.invariants, vec!["single entry point"]);
    }

    #[test]
    fn missing_path_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = extract_repo_state(&temp.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn directory_without_wrapper_state_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = extract_repo_state(temp.path()).unwrap_err();
        assert!(err.to_string().contains(".wrapper"));
    }

    #[test]
    fn one_valid_path_still_writes_external_state() {
        let temp = tempfile::tempdir().expect("tempdir");
        let valid = seeded_repo(&temp, "ui");
        let invalid = temp.path().join("missing");
        let local = temp.path().join("local");
        let paths = WrapperPaths::new(&local);

        let ok = run(&paths, &[valid, invalid]).expect("sync");
        assert!(ok);

        let external: ExternalState =
            crate::io::store::load_json(&paths.external_state)
                .expect("load")
                .expect("present");
        assert!(external.contains_key("ui"));
        assert_eq!(external.len(), 1);
    }

    #[test]
    fn zero_valid_paths_fails_without_writing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let local = temp.path().join("local");
        let paths = WrapperPaths::new(&local);

        let ok = run(&paths, &[temp.path().join("missing")]).expect("sync");
        assert!(!ok);
        assert!(!paths.external_state.exists());
    }
}

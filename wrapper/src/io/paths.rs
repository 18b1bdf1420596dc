//! Canonical paths for every file slot under `.wrapper/`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Directory name for wrapper state, relative to the working directory.
pub const WRAPPER_DIR: &str = ".wrapper";

/// All canonical paths within `.wrapper/` for a project root.
#[derive(Debug, Clone)]
pub struct WrapperPaths {
    pub root: PathBuf,
    pub wrapper_dir: PathBuf,
    // Human-authored inputs.
    pub architecture: PathBuf,
    pub repo_config: PathBuf,
    pub step: PathBuf,
    pub config: PathBuf,
    // Machine-written state.
    pub ledger: PathBuf,
    pub external_state: PathBuf,
    pub baseline_snapshot: PathBuf,
    pub deviations: PathBuf,
    pub implementation_plan: PathBuf,
    pub planning_session: PathBuf,
    // Generated artifacts.
    pub instruction_prompt: PathBuf,
    pub checklist: PathBuf,
    pub transcript: PathBuf,
    pub repair_prompt: PathBuf,
    pub diff: PathBuf,
}

impl WrapperPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let wrapper_dir = root.join(WRAPPER_DIR);
        Self {
            architecture: wrapper_dir.join("architecture.md"),
            repo_config: wrapper_dir.join("repo.yaml"),
            step: wrapper_dir.join("step.yaml"),
            config: wrapper_dir.join("config.yaml"),
            ledger: wrapper_dir.join("state.json"),
            external_state: wrapper_dir.join("external_state.json"),
            baseline_snapshot: wrapper_dir.join("baseline_snapshot.json"),
            deviations: wrapper_dir.join("deviations.json"),
            implementation_plan: wrapper_dir.join("implementation_plan.json"),
            planning_session: wrapper_dir.join("planning_session.json"),
            instruction_prompt: wrapper_dir.join("instruction_prompt.txt"),
            checklist: wrapper_dir.join("checklist.md"),
            transcript: wrapper_dir.join("transcript.txt"),
            repair_prompt: wrapper_dir.join("repair_prompt.txt"),
            diff: wrapper_dir.join("diff.txt"),
            root,
            wrapper_dir,
        }
    }

    /// Ensure `.wrapper/` exists and return its path.
    pub fn ensure_dir(&self) -> Result<&Path> {
        std::fs::create_dir_all(&self.wrapper_dir)
            .with_context(|| format!("create directory {}", self.wrapper_dir.display()))?;
        Ok(&self.wrapper_dir)
    }

    /// Repo name inferred from the working directory (init fallback).
    pub fn inferred_repo_name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_live_under_wrapper_dir() {
        let paths = WrapperPaths::new("/tmp/project");
        assert_eq!(paths.wrapper_dir, Path::new("/tmp/project/.wrapper"));
        assert_eq!(paths.ledger, Path::new("/tmp/project/.wrapper/state.json"));
        assert_eq!(paths.step, Path::new("/tmp/project/.wrapper/step.yaml"));
    }

    #[test]
    fn repo_name_inferred_from_directory() {
        let paths = WrapperPaths::new("/tmp/my-repo");
        assert_eq!(paths.inferred_repo_name(), "my-repo");
    }
}

//! Git adapter for wrapper commands.
//!
//! Verification reads facts straight from git, so we keep a small, explicit
//! wrapper around `git` subprocess calls. Every operation fails loudly when
//! the binary is missing or the invocation fails; callers check `is_repo`
//! before anything else.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// True when the working directory is inside a git repository.
    pub fn is_repo(&self) -> bool {
        self.run(&["rev-parse", "--git-dir"])
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Raw diff between the working tree (or index) and `HEAD`.
    #[instrument(skip_all, fields(staged))]
    pub fn diff(&self, staged: bool) -> Result<String> {
        if staged {
            self.run_capture(&["diff", "--cached"])
        } else {
            self.run_capture(&["diff", "HEAD"])
        }
    }

    /// Set of changed relative paths.
    pub fn changed_files(&self, staged: bool) -> Result<BTreeSet<String>> {
        let output = if staged {
            self.run_capture(&["diff", "--cached", "--name-only"])?
        } else {
            self.run_capture(&["diff", "HEAD", "--name-only"])?
        };
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Directories that contain changed files but did not exist at `HEAD`,
    /// determined by probing object existence per path prefix.
    pub fn new_directories(&self, staged: bool) -> Result<BTreeSet<String>> {
        let changed = self.changed_files(staged)?;
        let mut new_dirs = BTreeSet::new();
        for path in &changed {
            for prefix in ancestor_prefixes(path) {
                if new_dirs.contains(&prefix) {
                    continue;
                }
                if !self.object_exists_at_head(&prefix)? {
                    debug!(dir = %prefix, "directory not present at HEAD");
                    new_dirs.insert(prefix);
                }
            }
        }
        Ok(new_dirs)
    }

    /// Return the current branch name (`HEAD` when detached).
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    /// Return the current HEAD short SHA.
    pub fn head_short_sha(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--short", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    fn object_exists_at_head(&self, path: &str) -> Result<bool> {
        let spec = format!("HEAD:{path}");
        let output = self.run(&["cat-file", "-e", &spec])?;
        Ok(output.status.success())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {} (is git installed?)", args.join(" ")))
    }
}

/// All directory prefixes of a relative path, shallowest first.
fn ancestor_prefixes(path: &str) -> Vec<String> {
    let parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    (1..parts.len()).map(|i| parts[..i].join("/")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestor_prefixes_of_nested_path() {
        assert_eq!(
            ancestor_prefixes("a/b/c.txt"),
            vec!["a".to_string(), "a/b".to_string()]
        );
    }

    #[test]
    fn top_level_file_has_no_prefixes() {
        assert!(ancestor_prefixes("c.txt").is_empty());
    }
}

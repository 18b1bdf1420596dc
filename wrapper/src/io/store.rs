//! Document persistence for `.wrapper/` files.
//!
//! Loads return `Ok(None)` when a document is absent so missing-precondition
//! reporting stays in the command layer. JSON documents are written
//! pretty-printed with a trailing newline via temp file + rename.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::state::Ledger;
use crate::core::step::RepoConfig;
use crate::io::paths::WrapperPaths;

/// Current local time as an RFC 3339 string, used for every ledger and plan
/// timestamp.
pub fn now_timestamp() -> String {
    chrono::Local::now().to_rfc3339()
}

pub fn load_text(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(Some(contents))
}

pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let Some(contents) = load_text(path)? else {
        return Ok(None);
    };
    let value =
        serde_yaml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(value))
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let Some(contents) = load_text(path)? else {
        return Ok(None);
    };
    let value =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(value))
}

pub fn save_text(paths: &WrapperPaths, path: &Path, contents: &str) -> Result<()> {
    paths.ensure_dir()?;
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

/// Atomically write pretty-printed JSON (temp file + rename).
pub fn save_json<T: Serialize>(paths: &WrapperPaths, path: &Path, value: &T) -> Result<()> {
    paths.ensure_dir()?;
    let mut contents = serde_json::to_string_pretty(value).context("serialize json")?;
    contents.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// Load the ledger, creating and persisting a default if absent. The default
/// repo name comes from `repo.yaml` when available.
pub fn load_ledger(paths: &WrapperPaths) -> Result<Ledger> {
    if let Some(ledger) = load_json(&paths.ledger)? {
        return Ok(ledger);
    }
    let repo_name = load_yaml::<RepoConfig>(&paths.repo_config)?
        .map(|repo| repo.name_or_unknown().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let ledger = Ledger::new(repo_name);
    save_json(paths, &paths.ledger, &ledger)?;
    Ok(ledger)
}

pub fn save_ledger(paths: &WrapperPaths, ledger: &Ledger) -> Result<()> {
    save_json(paths, &paths.ledger, ledger)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_text_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(load_text(&temp.path().join("missing.md")).expect("load").is_none());
    }

    #[test]
    fn json_round_trips_with_trailing_newline() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = WrapperPaths::new(temp.path());
        let ledger = Ledger::new("repo");

        save_json(&paths, &paths.ledger, &ledger).expect("save");
        let raw = fs::read_to_string(&paths.ledger).expect("read");
        assert!(raw.ends_with("}\n"));

        let loaded: Ledger = load_json(&paths.ledger).expect("load").expect("present");
        assert_eq!(loaded.repo, "repo");
    }

    #[test]
    fn default_ledger_created_on_first_read() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = WrapperPaths::new(temp.path());
        fs::create_dir_all(&paths.wrapper_dir).expect("mkdir");
        fs::write(&paths.repo_config, "repo_name: my-api\n").expect("write repo.yaml");

        let ledger = load_ledger(&paths).expect("load");
        assert_eq!(ledger.repo, "my-api");
        assert!(ledger.done_steps.is_empty());
        assert!(paths.ledger.exists(), "default ledger should be persisted");
    }

    #[test]
    fn default_ledger_falls_back_to_unknown_repo() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = WrapperPaths::new(temp.path());

        let ledger = load_ledger(&paths).expect("load");
        assert_eq!(ledger.repo, "unknown");
    }
}

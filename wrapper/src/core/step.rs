//! Step definitions and repo-level constraints.
//!
//! `step.yaml` is written by `wrapper propose` and consumed by every later
//! stage; `repo.yaml` is authored by a human. Both are YAML mappings with
//! tolerant parsing: the model (and the human) may omit fields, and
//! forbidden items come in two shapes that are normalized at this boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of work a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Verification,
    Implementation,
    /// Anything else the model emitted; treated as implementation-like.
    #[serde(other)]
    #[default]
    Unknown,
}

impl StepType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::Implementation => "implementation",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One proposed unit of work with declared constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step_id: String,
    #[serde(rename = "type", default)]
    pub step_type: StepType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub allowed_files: Vec<String>,
    #[serde(default)]
    pub forbidden: Vec<ForbiddenItem>,
    #[serde(default)]
    pub success_criteria: Vec<String>,
}

/// A forbidden action, either a plain string or a single-key labeled mapping
/// (`example: description`). Normalized to the display text of its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForbiddenItem {
    Plain(String),
    Labeled(BTreeMap<String, serde_yaml::Value>),
}

impl ForbiddenItem {
    /// Single display string for rule checks and prompt rendering.
    pub fn normalized(&self) -> String {
        match self {
            Self::Plain(text) => text.trim().to_string(),
            Self::Labeled(map) => map.values().next().map(display_value).unwrap_or_default(),
        }
    }
}

fn display_value(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(text) => text.trim().to_string(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim()
            .to_string(),
    }
}

/// Another repo this one depends on, either bare name or `{repo, via}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dependency {
    Detailed {
        repo: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        via: Option<String>,
    },
    Name(String),
}

impl Dependency {
    pub fn repo_name(&self) -> &str {
        match self {
            Self::Detailed { repo, .. } => repo,
            Self::Name(name) => name,
        }
    }
}

/// Human-authored repository role and hard constraints (`repo.yaml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoConfig {
    #[serde(default)]
    pub repo_name: String,
    #[serde(default)]
    pub repo_role: String,
    #[serde(default)]
    pub must_not: Vec<ForbiddenItem>,
    #[serde(default)]
    pub depends_on: Vec<Dependency>,
}

impl RepoConfig {
    /// Repo name with the original's `"unknown"` fallback.
    pub fn name_or_unknown(&self) -> &str {
        if self.repo_name.trim().is_empty() {
            "unknown"
        } else {
            &self.repo_name
        }
    }
}

/// Repo-level and step-level forbidden items, normalized and merged in order.
pub fn merged_forbidden(repo: &RepoConfig, step: &Step) -> Vec<String> {
    repo.must_not
        .iter()
        .chain(step.forbidden.iter())
        .map(ForbiddenItem::normalized)
        .filter(|text| !text.is_empty())
        .collect()
}

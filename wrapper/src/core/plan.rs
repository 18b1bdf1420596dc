//! Implementation plan model (`implementation_plan.json`).
//!
//! Created by the interactive plan wizard, mutated by `wrapper accept`
//! (completion stamps) and read by the progress views and the feature
//! tester. Fields are defaulted liberally because phases and steps originate
//! as model output.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub metadata: PlanMetadata,
    #[serde(default)]
    pub phases: Vec<Phase>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanMetadata {
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub repo_name: String,
    #[serde(default)]
    pub total_phases: usize,
    #[serde(default)]
    pub total_steps: usize,
    #[serde(default)]
    pub estimated_hours: f64,
    #[serde(default)]
    pub planning_context: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Phase {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub deviations_addressed: Vec<String>,
    #[serde(default)]
    pub estimated_complexity: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

impl Phase {
    /// `(completed, total)` step counts against the ledger's done ids.
    pub fn completion(&self, done_ids: &BTreeSet<String>) -> (usize, usize) {
        let completed = self
            .steps
            .iter()
            .filter(|step| done_ids.contains(&step.step_id))
            .count();
        (completed, self.steps.len())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(default)]
    pub step_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub files_to_modify: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_hours")]
    pub estimated_hours: f64,
    #[serde(default)]
    pub risk: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_changed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Requirements>,
}

fn default_hours() -> f64 {
    1.0
}

/// Non-functional requirements gathered during planning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<Performance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cost: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Requirements {
    pub fn is_empty(&self) -> bool {
        self.security.is_empty()
            && self.performance.is_none()
            && self.cost.is_empty()
            && self.notes.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Performance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_target_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Plan {
    pub fn total_steps(&self) -> usize {
        self.phases.iter().map(|phase| phase.steps.len()).sum()
    }

    pub fn estimated_hours(&self) -> f64 {
        self.phases
            .iter()
            .flat_map(|phase| phase.steps.iter())
            .map(|step| step.estimated_hours)
            .sum()
    }

    /// First step, in phase order, that has not been completed.
    pub fn next_open_step(&self) -> Option<(&Phase, &PlanStep)> {
        self.phases.iter().find_map(|phase| {
            phase
                .steps
                .iter()
                .find(|step| !step.completed)
                .map(|step| (phase, step))
        })
    }

    pub fn find_step(&self, step_id: &str) -> Option<(&Phase, &PlanStep)> {
        self.phases.iter().find_map(|phase| {
            phase
                .steps
                .iter()
                .find(|step| step.step_id == step_id)
                .map(|step| (phase, step))
        })
    }

    pub fn completed_steps(&self) -> Vec<(&Phase, &PlanStep)> {
        self.phases
            .iter()
            .flat_map(|phase| {
                phase
                    .steps
                    .iter()
                    .filter(|step| step.completed)
                    .map(move |step| (phase, step))
            })
            .collect()
    }

    /// Mark a step completed, recording when and what changed. Returns false
    /// when no step with that id exists anywhere in the plan.
    pub fn mark_completed(
        &mut self,
        step_id: &str,
        timestamp: String,
        files_changed: Vec<String>,
        notes: Option<String>,
    ) -> bool {
        for phase in &mut self.phases {
            for step in &mut phase.steps {
                if step.step_id == step_id {
                    step.completed = true;
                    step.completed_at = Some(timestamp);
                    if !files_changed.is_empty() {
                        step.files_changed = files_changed;
                    }
                    if notes.is_some() {
                        step.implementation_notes = notes;
                    }
                    return true;
                }
            }
        }
        false
    }
}

/// Textual progress bar used by the status view.
pub fn progress_bar(completed: usize, total: usize, width: usize) -> String {
    if total == 0 {
        return "░".repeat(width);
    }
    let filled = width * completed / total;
    format!("{}{}", "▓".repeat(filled), "░".repeat(width - filled))
}

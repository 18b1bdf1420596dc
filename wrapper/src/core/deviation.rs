//! Recorded mismatches between declared architecture and actual repository
//! state (`deviations.json`).
//!
//! Generated once by a model comparison of the architecture against the
//! baseline snapshot; entries are later stamped with `resolution_step` by
//! `wrapper accept`. Every field is defaulted because the document originates
//! as model output.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deviations {
    #[serde(default)]
    pub deviations: Vec<Deviation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deviation {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub affected_files: Vec<String>,
    #[serde(default)]
    pub expected: String,
    #[serde(default)]
    pub actual: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_step: Option<String>,
}

impl Deviations {
    pub fn unresolved(&self) -> Vec<&Deviation> {
        self.deviations
            .iter()
            .filter(|dev| dev.resolution_step.is_none())
            .collect()
    }

    /// Stamp `resolution_step` on every unresolved deviation whose id is in
    /// `resolved_ids`. Returns how many were updated.
    pub fn mark_resolved(&mut self, resolved_ids: &[String], step_id: &str) -> usize {
        let mut updated = 0;
        for dev in &mut self.deviations {
            if dev.resolution_step.is_none() && resolved_ids.iter().any(|id| id == &dev.id) {
                dev.resolution_step = Some(step_id.to_string());
                updated += 1;
            }
        }
        updated
    }
}
